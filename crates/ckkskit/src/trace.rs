//! Step records emitted by the evaluator.
//!
//! Demos never print while they compute. Instead every evaluator call hands
//! a [`StepRecord`] to an [`EvalObserver`]; the caller decides whether to
//! collect the records ([`TraceRecorder`]) or log them ([`LogObserver`]).

use std::cell::RefCell;
use std::fmt;

use log::debug;

use ckkskit_core::Ciphertext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Add,
    AddPlain,
    Sub,
    Negate,
    Multiply,
    MultiplyPlain,
    Relinearize,
    Rescale,
    ModSwitch,
    Rotate(i64),
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Add => write!(f, "add"),
            Operation::AddPlain => write!(f, "add_plain"),
            Operation::Sub => write!(f, "sub"),
            Operation::Negate => write!(f, "negate"),
            Operation::Multiply => write!(f, "multiply"),
            Operation::MultiplyPlain => write!(f, "multiply_plain"),
            Operation::Relinearize => write!(f, "relinearize"),
            Operation::Rescale => write!(f, "rescale"),
            Operation::ModSwitch => write!(f, "mod_switch"),
            Operation::Rotate(steps) => write!(f, "rotate({steps})"),
        }
    }
}

/// Scale and level of one ciphertext at one point of a computation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Snapshot {
    pub scale: f64,
    pub level: usize,
}

impl From<&Ciphertext> for Snapshot {
    fn from(ct: &Ciphertext) -> Self {
        Self {
            scale: ct.scale,
            level: ct.level,
        }
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(2^{:.2}, level {})", self.scale.log2(), self.level)
    }
}

/// One evaluator call: what ran, on what, producing what.
#[derive(Debug, Clone, PartialEq)]
pub struct StepRecord {
    pub operation: Operation,
    pub operands: Vec<Snapshot>,
    pub result: Snapshot,
}

impl StepRecord {
    pub fn new(operation: Operation, operands: &[&Ciphertext], result: &Ciphertext) -> Self {
        Self {
            operation,
            operands: operands.iter().map(|&ct| Snapshot::from(ct)).collect(),
            result: Snapshot::from(result),
        }
    }
}

impl fmt::Display for StepRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<16}", self.operation.to_string())?;
        for (i, operand) in self.operands.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{operand}")?;
        }
        write!(f, " -> {}", self.result)
    }
}

/// Receives a record after every successful evaluator operation.
pub trait EvalObserver {
    fn on_step(&self, record: &StepRecord);
}

/// Collects records in order, optionally passing each one on to another
/// observer as it arrives.
#[derive(Default)]
pub struct TraceRecorder<'a> {
    records: RefCell<Vec<StepRecord>>,
    forward: Option<&'a dyn EvalObserver>,
}

impl<'a> TraceRecorder<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn forwarding(forward: Option<&'a dyn EvalObserver>) -> Self {
        Self {
            records: RefCell::default(),
            forward,
        }
    }

    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }

    /// Take the records collected so far, leaving the recorder empty.
    pub fn take(&self) -> Vec<StepRecord> {
        self.records.take()
    }
}

impl EvalObserver for TraceRecorder<'_> {
    fn on_step(&self, record: &StepRecord) {
        if let Some(forward) = self.forward {
            forward.on_step(record);
        }
        self.records.borrow_mut().push(record.clone());
    }
}

/// Logs every record at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl EvalObserver for LogObserver {
    fn on_step(&self, record: &StepRecord) {
        debug!("{record}");
    }
}
