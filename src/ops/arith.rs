//! Aligned binary arithmetic and elementwise unary maps.
//!
//! `x + y` on nodes desugars to an aligned binary operator with UNION
//! alignment; scalars lift to constant nodes.  All constructors fold
//! constant subgraphs immediately: the combination of two constants is
//! itself a constant node, interned as such.

use std::borrow::Cow;
use std::ops;
use std::sync::Arc;

use crate::algebra;
use crate::align::{merge, AlignState, Alignment};
use crate::block::{Block, BlockBuilder};
use crate::error::{Error, Result};
use crate::graph::{obtain_node, Node};
use crate::ops::source::constant;
use crate::ops::traits::{binary_inputs, state_of, unary_input, Op, OpKey, OpState};
use crate::time::Timestamp;
use crate::value::{Value, ValueType};

/// Pointwise binary operations on aligned pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryFunc {
    Add,
    Sub,
    Mul,
    Div,
    Min,
    Max,
}

impl BinaryFunc {
    pub fn apply(self, a: &Value, b: &Value) -> Result<Value> {
        match self {
            Self::Add => algebra::add(a, b),
            Self::Sub => algebra::sub(a, b),
            Self::Mul => algebra::mul(a, b),
            Self::Div => algebra::div(a, b),
            Self::Min => algebra::min(a, b),
            Self::Max => algebra::max(a, b),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::Div => "div",
            Self::Min => "min",
            Self::Max => "max",
        }
    }

    fn output_type(self, a: ValueType, b: ValueType) -> Result<ValueType> {
        let promoted = a.promote(b)?;
        // True division is always float-valued on scalars.
        if self == Self::Div && promoted == ValueType::Int {
            return Ok(ValueType::Float);
        }
        Ok(promoted)
    }
}

/// Pointwise unary operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryFunc {
    Neg,
    Abs,
    Ln,
    Exp,
    Sqrt,
}

impl UnaryFunc {
    pub fn apply(self, a: &Value) -> Result<Value> {
        match self {
            Self::Neg => algebra::neg(a),
            Self::Abs => algebra::abs(a),
            Self::Ln => algebra::ln(a),
            Self::Exp => algebra::exp(a),
            Self::Sqrt => algebra::sqrt(a),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Neg => "neg",
            Self::Abs => "abs",
            Self::Ln => "ln",
            Self::Exp => "exp",
            Self::Sqrt => "sqrt",
        }
    }

    fn output_type(self, input: ValueType) -> Result<ValueType> {
        match self {
            Self::Neg | Self::Abs => input.promote(input),
            // Transcendental maps promote integers to floats.
            Self::Ln | Self::Exp | Self::Sqrt => match input.promote(input)? {
                ValueType::Int => Ok(ValueType::Float),
                t => Ok(t),
            },
        }
    }
}

struct BinaryAligned {
    func: BinaryFunc,
    alignment: Alignment,
    initial: (Option<Value>, Option<Value>),
}

impl Op for BinaryAligned {
    fn name(&self) -> Cow<'static, str> {
        Cow::from(self.func.name())
    }

    fn key(&self) -> OpKey {
        OpKey::Binary {
            func: self.func,
            alignment: self.alignment,
            initial_x: self.initial.0.clone(),
            initial_y: self.initial.1.clone(),
        }
    }

    fn output_type(&self, parents: &[ValueType]) -> Result<ValueType> {
        self.func.output_type(parents[0], parents[1])
    }

    fn init_state(&self) -> OpState {
        Box::new(AlignState::with_initial(
            self.initial.0.clone(),
            self.initial.1.clone(),
        ))
    }

    fn run(
        &self,
        state: &mut OpState,
        _start: Timestamp,
        _end: Timestamp,
        parents: &[&Block],
    ) -> Result<Block> {
        let align = state_of::<AlignState>(state);
        let (x, y) = binary_inputs(parents);
        let pairs = merge(x, y, self.alignment, align);
        let mut out = BlockBuilder::with_capacity(pairs.len());
        for (t, xv, yv) in pairs {
            out.push(t, self.func.apply(&xv, &yv)?);
        }
        Ok(out.finish())
    }

    fn always_ticks(&self) -> bool {
        true
    }

    fn time_agnostic(&self) -> bool {
        true
    }
}

struct MapOp {
    func: UnaryFunc,
}

impl Op for MapOp {
    fn name(&self) -> Cow<'static, str> {
        Cow::from(self.func.name())
    }

    fn key(&self) -> OpKey {
        OpKey::Map { func: self.func }
    }

    fn output_type(&self, parents: &[ValueType]) -> Result<ValueType> {
        self.func.output_type(parents[0])
    }

    fn init_state(&self) -> OpState {
        Box::new(())
    }

    fn run(
        &self,
        _state: &mut OpState,
        _start: Timestamp,
        _end: Timestamp,
        parents: &[&Block],
    ) -> Result<Block> {
        let input = unary_input(parents);
        let mut out = BlockBuilder::with_capacity(input.len());
        for (t, v) in input.iter() {
            out.push(t, self.func.apply(v)?);
        }
        Ok(out.finish())
    }

    fn always_ticks(&self) -> bool {
        true
    }

    fn time_agnostic(&self) -> bool {
        true
    }
}

/// The aligned binary operator `func` over `x` and `y`.
///
/// Two constant operands fold to a constant node immediately.
pub fn binary(x: &Node, y: &Node, func: BinaryFunc, alignment: Alignment) -> Result<Node> {
    binary_with_initial(x, y, func, alignment, None, None)
}

/// Like [`binary`], with bootstrap values latched per side before the
/// first knot, so emission may begin before both sides have ticked.
pub fn binary_with_initial(
    x: &Node,
    y: &Node,
    func: BinaryFunc,
    alignment: Alignment,
    initial_x: Option<Value>,
    initial_y: Option<Value>,
) -> Result<Node> {
    if let (Some(a), Some(b)) = (x.constant_value(), y.constant_value()) {
        return constant(func.apply(a, b)?);
    }
    for (initial, node) in [(&initial_x, x), (&initial_y, y)] {
        if let Some(v) = initial {
            if v.value_type() != node.value_type() {
                return Err(Error::TypeMismatch {
                    expected: "bootstrap value matching the operand type",
                    actual: v.value_type(),
                });
            }
        }
    }
    obtain_node(
        vec![x.clone(), y.clone()],
        Arc::new(BinaryAligned {
            func,
            alignment,
            initial: (initial_x, initial_y),
        }),
    )
}

/// The elementwise map `func` over `x`; folds constants.
pub fn map(x: &Node, func: UnaryFunc) -> Result<Node> {
    if let Some(v) = x.constant_value() {
        return constant(func.apply(v)?);
    }
    obtain_node(vec![x.clone()], Arc::new(MapOp { func }))
}

/// Pointwise minimum of two nodes under the given alignment.
pub fn min(x: &Node, y: &Node, alignment: Alignment) -> Result<Node> {
    binary(x, y, BinaryFunc::Min, alignment)
}

/// Pointwise maximum of two nodes under the given alignment.
pub fn max(x: &Node, y: &Node, alignment: Alignment) -> Result<Node> {
    binary(x, y, BinaryFunc::Max, alignment)
}

impl Node {
    /// Elementwise negation.
    pub fn neg(&self) -> Result<Node> {
        map(self, UnaryFunc::Neg)
    }

    /// Elementwise absolute value.
    pub fn abs(&self) -> Result<Node> {
        map(self, UnaryFunc::Abs)
    }

    /// Elementwise natural logarithm.
    pub fn ln(&self) -> Result<Node> {
        map(self, UnaryFunc::Ln)
    }

    /// Elementwise exponential.
    pub fn exp(&self) -> Result<Node> {
        map(self, UnaryFunc::Exp)
    }

    /// Elementwise square root.
    pub fn sqrt(&self) -> Result<Node> {
        map(self, UnaryFunc::Sqrt)
    }
}

// Operator sugar defaults to UNION alignment and panics on construction
// errors; use `binary` for fallible construction or another alignment.
macro_rules! node_binop {
    ($trait:ident, $method:ident, $func:ident) => {
        impl ops::$trait<&Node> for &Node {
            type Output = Node;

            /// # Panics
            ///
            /// Panics if the operand types are incompatible.
            fn $method(self, rhs: &Node) -> Node {
                binary(self, rhs, BinaryFunc::$func, Alignment::Union)
                    .unwrap_or_else(|e| panic!("{}", e))
            }
        }

        impl ops::$trait<Node> for Node {
            type Output = Node;

            fn $method(self, rhs: Node) -> Node {
                ops::$trait::$method(&self, &rhs)
            }
        }

        impl ops::$trait<&Node> for Node {
            type Output = Node;

            fn $method(self, rhs: &Node) -> Node {
                ops::$trait::$method(&self, rhs)
            }
        }

        impl ops::$trait<Node> for &Node {
            type Output = Node;

            fn $method(self, rhs: Node) -> Node {
                ops::$trait::$method(self, &rhs)
            }
        }

        impl ops::$trait<f64> for &Node {
            type Output = Node;

            fn $method(self, rhs: f64) -> Node {
                let rhs = constant(rhs).unwrap_or_else(|e| panic!("{}", e));
                ops::$trait::$method(self, &rhs)
            }
        }

        impl ops::$trait<&Node> for f64 {
            type Output = Node;

            fn $method(self, rhs: &Node) -> Node {
                let lhs = constant(self).unwrap_or_else(|e| panic!("{}", e));
                ops::$trait::$method(&lhs, rhs)
            }
        }

        impl ops::$trait<i64> for &Node {
            type Output = Node;

            fn $method(self, rhs: i64) -> Node {
                let rhs = constant(rhs).unwrap_or_else(|e| panic!("{}", e));
                ops::$trait::$method(self, &rhs)
            }
        }

        impl ops::$trait<&Node> for i64 {
            type Output = Node;

            fn $method(self, rhs: &Node) -> Node {
                let lhs = constant(self).unwrap_or_else(|e| panic!("{}", e));
                ops::$trait::$method(&lhs, rhs)
            }
        }
    };
}

node_binop!(Add, add, Add);
node_binop!(Sub, sub, Sub);
node_binop!(Mul, mul, Mul);
node_binop!(Div, div, Div);
