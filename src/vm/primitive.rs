//! Primitive Function Table
//!
//! Primitives are the user-defined operations a grammar is built from. Each one is
//! registered once, with its result type and argument types resolved at
//! registration, and assigned a sequential 16-bit [`PrimitiveId`]. Instructions
//! refer to primitives by id, so dispatch is a vector index.
//!
//! # Calling conventions
//!
//! - **Pure** primitives receive their arguments in declared order (the machine
//!   pops them rightmost-first) and return a new value.
//! - **In-place** primitives mutate their first argument where it sits on top of
//!   its stack; the remaining arguments are popped as for pure primitives. The
//!   first argument type must equal the result type.
//!
//! # Example
//!
//! ```ignore
//! let mut table = PrimitiveTable::new();
//! let id = table.register_pure("cons", ValueType::Str, &[ValueType::Char, ValueType::Str],
//!     |args| {
//!         let c = args[0].as_char().unwrap_or_default();
//!         let s = args[1].as_str().unwrap_or_default();
//!         Ok(Value::Str(format!("{}{}", c, s)))
//!     });
//! ```

use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;

use super::opcodes::PrimitiveId;
use super::value::{Value, ValueType};

/// Result type for primitive calls
pub type PrimitiveResult<T> = Result<T, PrimitiveError>;

/// Failures raised by primitives. Any of these aborts only the executing path.
#[derive(Debug, Clone, PartialEq)]
pub enum PrimitiveError {
    /// Operation is undefined for these operands
    Runtime(String),
    /// An operand exceeded a size bound
    SizeLimit { limit: usize, got: usize },
    /// Index outside a value
    IndexOutOfBounds { index: i64, len: usize },
}

impl fmt::Display for PrimitiveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Runtime(msg) => write!(f, "runtime error: {}", msg),
            Self::SizeLimit { limit, got } => {
                write!(f, "size limit exceeded: {} > {}", got, limit)
            }
            Self::IndexOutOfBounds { index, len } => {
                write!(f, "index {} out of bounds for length {}", index, len)
            }
        }
    }
}

impl std::error::Error for PrimitiveError {}

/// Pure primitive: arguments in declared order to a fresh value.
pub type PureFn = Arc<dyn Fn(&[Value]) -> PrimitiveResult<Value> + Send + Sync>;

/// In-place primitive: mutates the first argument given the rest.
pub type InPlaceFn = Arc<dyn Fn(&mut Value, &[Value]) -> PrimitiveResult<()> + Send + Sync>;

#[derive(Clone)]
pub enum PrimitiveFn {
    Pure(PureFn),
    InPlace(InPlaceFn),
}

/// Argument type list; most primitives take at most four arguments.
pub type ArgTypes = SmallVec<[ValueType; 4]>;

/// A registered primitive.
#[derive(Clone)]
pub struct Primitive {
    pub name: String,
    pub output: ValueType,
    pub args: ArgTypes,
    pub func: PrimitiveFn,
}

impl Primitive {
    pub fn arity(&self) -> usize {
        self.args.len()
    }

    pub fn is_in_place(&self) -> bool {
        matches!(self.func, PrimitiveFn::InPlace(_))
    }

    /// Number of arguments the machine pops before calling.
    pub fn popped(&self) -> usize {
        if self.is_in_place() {
            self.args.len().saturating_sub(1)
        } else {
            self.args.len()
        }
    }
}

impl fmt::Debug for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Primitive")
            .field("name", &self.name)
            .field("output", &self.output)
            .field("args", &self.args)
            .field("in_place", &self.is_in_place())
            .finish()
    }
}

/// Table of primitives indexed by [`PrimitiveId`].
///
/// The table is append-only; ids are never reassigned.
#[derive(Clone, Default)]
pub struct PrimitiveTable {
    primitives: Vec<Primitive>,
}

impl fmt::Debug for PrimitiveTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrimitiveTable")
            .field("count", &self.primitives.len())
            .field(
                "names",
                &self.primitives.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl PrimitiveTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> PrimitiveId {
        debug_assert!(self.primitives.len() < u16::MAX as usize, "primitive table full");
        PrimitiveId(self.primitives.len() as u16)
    }

    /// Register a pure primitive.
    pub fn register_pure<F>(
        &mut self,
        name: &str,
        output: ValueType,
        args: &[ValueType],
        func: F,
    ) -> PrimitiveId
    where
        F: Fn(&[Value]) -> PrimitiveResult<Value> + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.primitives.push(Primitive {
            name: name.to_string(),
            output,
            args: args.iter().copied().collect(),
            func: PrimitiveFn::Pure(Arc::new(func)),
        });
        id
    }

    /// Register an in-place primitive. `args[0]` must equal `output`; the caller
    /// (the grammar) checks this before registering.
    pub fn register_in_place<F>(
        &mut self,
        name: &str,
        output: ValueType,
        args: &[ValueType],
        func: F,
    ) -> PrimitiveId
    where
        F: Fn(&mut Value, &[Value]) -> PrimitiveResult<()> + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.primitives.push(Primitive {
            name: name.to_string(),
            output,
            args: args.iter().copied().collect(),
            func: PrimitiveFn::InPlace(Arc::new(func)),
        });
        id
    }

    /// Register a constant: a zero-argument primitive returning `value`.
    pub fn register_constant(&mut self, name: &str, value: Value) -> PrimitiveId {
        let output = value.value_type();
        self.register_pure(name, output, &[], move |_| Ok(value.clone()))
    }

    pub fn get(&self, id: PrimitiveId) -> Option<&Primitive> {
        self.primitives.get(id.0 as usize)
    }

    pub fn len(&self) -> usize {
        self.primitives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PrimitiveId, &Primitive)> {
        self.primitives
            .iter()
            .enumerate()
            .map(|(i, p)| (PrimitiveId(i as u16), p))
    }
}
