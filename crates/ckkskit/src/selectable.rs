//! Encrypted values tagged with encrypted selection flags.
//!
//! Every item carries the same number of flags, each an encryption of 1
//! ([`Flag::On`]) or 0 ([`Flag::Off`]). A flag-masked sum multiplies each
//! value by its flag and adds the products, so the server never learns
//! which items were selected.

use ckkskit_core::{Ciphertext, CkksError, Result};

use crate::channel::Channel;
use crate::evaluator::Evaluator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    On,
    Off,
}

impl Flag {
    /// The plaintext a flag encrypts.
    pub fn value(self) -> f64 {
        match self {
            Flag::On => 1.0,
            Flag::Off => 0.0,
        }
    }
}

/// How [`SelectableCollection::operate_many`] combines the values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    Sum,
    /// Consumes one level per item after the first.
    Product,
}

/// One encrypted value and its flags.
#[derive(Debug, Clone)]
pub struct SelectableItem {
    value: Ciphertext,
    flags: Vec<Ciphertext>,
}

impl SelectableItem {
    /// Encrypt `value` with `flag_count` flags, all off.
    pub fn encrypt(channel: &mut Channel<'_>, value: f64, flag_count: usize) -> Result<Self> {
        let scale = channel.context().initial_scale();
        let value = channel.encode_encrypt(value, scale)?;
        let flags = (0..flag_count)
            .map(|_| channel.encode_encrypt(Flag::Off.value(), scale))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { value, flags })
    }

    pub fn value(&self) -> &Ciphertext {
        &self.value
    }

    pub fn flag(&self, index: usize) -> Option<&Ciphertext> {
        self.flags.get(index)
    }

    pub fn flag_count(&self) -> usize {
        self.flags.len()
    }

    /// Replace flag `index` with a fresh encryption of `flag`.
    pub fn set_flag(&mut self, channel: &mut Channel<'_>, index: usize, flag: Flag) -> Result<()> {
        let count = self.flags.len();
        let slot = self
            .flags
            .get_mut(index)
            .ok_or_else(|| CkksError::Configuration(format!("flag {index} out of range for {count} flags")))?;
        *slot = channel.encode_encrypt(flag.value(), channel.context().initial_scale())?;
        Ok(())
    }
}

/// Items that all carry `flag_count` flags.
#[derive(Debug, Clone)]
pub struct SelectableCollection {
    flag_count: usize,
    items: Vec<SelectableItem>,
}

impl SelectableCollection {
    pub fn new(flag_count: usize) -> Self {
        Self {
            flag_count,
            items: Vec::new(),
        }
    }

    pub fn flag_count(&self) -> usize {
        self.flag_count
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[SelectableItem] {
        &self.items
    }

    pub fn item_mut(&mut self, index: usize) -> Option<&mut SelectableItem> {
        self.items.get_mut(index)
    }

    /// Fails with `ParameterMismatch` when the item's flag count differs.
    pub fn push(&mut self, item: SelectableItem) -> Result<()> {
        if item.flag_count() != self.flag_count {
            return Err(CkksError::ParameterMismatch(format!(
                "item has {} flags, collection expects {}",
                item.flag_count(),
                self.flag_count
            )));
        }
        self.items.push(item);
        Ok(())
    }

    /// Encrypt `value` with every flag off and append it.
    pub fn push_plain(&mut self, channel: &mut Channel<'_>, value: f64) -> Result<()> {
        let item = SelectableItem::encrypt(channel, value, self.flag_count)?;
        self.push(item)
    }

    /// Combine every value. `None` for an empty collection.
    pub fn operate_many(&self, evaluator: &Evaluator<'_>, reduction: Reduction) -> Result<Option<Ciphertext>> {
        let Some((first, rest)) = self.items.split_first() else {
            return Ok(None);
        };
        let mut acc = first.value.clone();
        for item in rest {
            match reduction {
                Reduction::Sum => evaluator.add_inplace(&mut acc, &item.value)?,
                Reduction::Product => {
                    let value = evaluator.mod_switch_to(&item.value, acc.level)?;
                    acc = evaluator.multiply_rescale(&acc, &value)?;
                }
            }
        }
        Ok(Some(acc))
    }

    /// Σ value · flag over all items, for flag `index`. `None` for an empty
    /// collection. The result sits one level below the inputs.
    pub fn operate_many_where_flag(&self, evaluator: &Evaluator<'_>, index: usize) -> Result<Option<Ciphertext>> {
        if index >= self.flag_count {
            return Err(CkksError::Configuration(format!(
                "flag {index} out of range for {} flags",
                self.flag_count
            )));
        }
        let mut acc = None;
        for item in &self.items {
            let flag = item
                .flag(index)
                .ok_or_else(|| CkksError::Configuration(format!("item is missing flag {index}")))?;
            let masked = evaluator.multiply_rescale(&item.value, flag)?;
            evaluator.accumulate(&mut acc, masked)?;
        }
        Ok(acc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SchemeContext;
    use crate::parameter_set::ParameterSet;
    use ckkskit_core::SecurityLevel;

    fn context() -> SchemeContext {
        let set = ParameterSet::new(1024, &[50, 30, 30, 50], 2f64.powi(30))
            .with_security(SecurityLevel::None);
        SchemeContext::builder(set).seed(51).build().unwrap()
    }

    fn collection(channel: &mut Channel<'_>, values: &[f64], flag_count: usize) -> SelectableCollection {
        let mut collection = SelectableCollection::new(flag_count);
        for &v in values {
            collection.push_plain(channel, v).unwrap();
        }
        collection
    }

    #[test]
    fn test_new_collection_is_empty() {
        let ctx = context();
        let eval = Evaluator::new(&ctx);
        let collection = SelectableCollection::new(2);
        assert!(collection.is_empty());
        assert_eq!(collection.flag_count(), 2);
        assert!(collection.operate_many(&eval, Reduction::Sum).unwrap().is_none());
        assert!(collection.operate_many_where_flag(&eval, 1).unwrap().is_none());
    }

    #[test]
    fn test_new_item_flags_are_off() {
        let ctx = context();
        let mut channel = Channel::with_seed(&ctx, 1);
        let mut item = SelectableItem::encrypt(&mut channel, 3.0, 2).unwrap();
        let off = channel.decrypt_decode(item.flag(0).unwrap()).unwrap();
        assert!(off.abs() < 1e-4, "decoded {off}");
        assert!(item.flag(2).is_none());

        item.set_flag(&mut channel, 1, Flag::On).unwrap();
        let on = channel.decrypt_decode(item.flag(1).unwrap()).unwrap();
        assert!((on - 1.0).abs() < 1e-4, "decoded {on}");
        assert!(matches!(
            item.set_flag(&mut channel, 2, Flag::On),
            Err(CkksError::Configuration(_))
        ));
    }

    #[test]
    fn test_push_rejects_wrong_flag_count() {
        let ctx = context();
        let mut channel = Channel::with_seed(&ctx, 2);
        let mut collection = SelectableCollection::new(2);
        let item = SelectableItem::encrypt(&mut channel, 1.0, 3).unwrap();
        assert!(matches!(collection.push(item), Err(CkksError::ParameterMismatch(_))));
        assert!(collection.is_empty());
    }

    #[test]
    fn test_operate_many() {
        let ctx = context();
        let mut channel = Channel::with_seed(&ctx, 3);
        let eval = Evaluator::new(&ctx);
        let collection = collection(&mut channel, &[1.5, 2.0, -0.5], 1);

        let sum = collection.operate_many(&eval, Reduction::Sum).unwrap().unwrap();
        let value = channel.decrypt_decode(&sum).unwrap();
        assert!((value - 3.0).abs() < 1e-4, "decoded {value}");

        let product = collection.operate_many(&eval, Reduction::Product).unwrap().unwrap();
        assert_eq!(product.level, 0);
        let value = channel.decrypt_decode(&product).unwrap();
        assert!((value + 1.5).abs() < 1e-3, "decoded {value}");
    }

    #[test]
    fn test_operate_many_where_flag() {
        let ctx = context();
        let mut channel = Channel::with_seed(&ctx, 4);
        let eval = Evaluator::new(&ctx);
        let mut collection = collection(&mut channel, &[1.5, 2.0, 4.0], 2);
        for index in [0, 2] {
            collection
                .item_mut(index)
                .unwrap()
                .set_flag(&mut channel, 0, Flag::On)
                .unwrap();
        }
        collection.item_mut(1).unwrap().set_flag(&mut channel, 1, Flag::On).unwrap();

        let first = collection.operate_many_where_flag(&eval, 0).unwrap().unwrap();
        assert_eq!(first.level, ctx.max_level() - 1);
        let value = channel.decrypt_decode(&first).unwrap();
        assert!((value - 5.5).abs() < 1e-3, "decoded {value}");

        let second = collection.operate_many_where_flag(&eval, 1).unwrap().unwrap();
        let value = channel.decrypt_decode(&second).unwrap();
        assert!((value - 2.0).abs() < 1e-3, "decoded {value}");

        assert!(matches!(
            collection.operate_many_where_flag(&eval, 2),
            Err(CkksError::Configuration(_))
        ));
    }
}
