//! Arithmetic tools
//!
//! One tool per binary operation so the model can pick by name, plus `sqrt`.
//! Results are returned as `{"result": n}`, with integral values rendered
//! without a fractional part.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{parse_args, ParamKind, ToolDescriptor, ToolError, ToolPayload, ToolTrait};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,
    Modulus,
}

impl BinaryOp {
    pub const ALL: [BinaryOp; 6] = [
        BinaryOp::Add,
        BinaryOp::Subtract,
        BinaryOp::Multiply,
        BinaryOp::Divide,
        BinaryOp::Power,
        BinaryOp::Modulus,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Subtract => "subtract",
            BinaryOp::Multiply => "multiply",
            BinaryOp::Divide => "divide",
            BinaryOp::Power => "power",
            BinaryOp::Modulus => "modulus",
        }
    }

    fn description(self) -> &'static str {
        match self {
            BinaryOp::Add => "Add two numbers: a + b",
            BinaryOp::Subtract => "Subtract two numbers: a - b",
            BinaryOp::Multiply => "Multiply two numbers: a * b",
            BinaryOp::Divide => "Divide two numbers: a / b",
            BinaryOp::Power => "Raise a to the power of b",
            BinaryOp::Modulus => "Remainder of a divided by b, with the sign of b",
        }
    }

    pub fn apply(self, a: f64, b: f64) -> Result<f64, ToolError> {
        let result = match self {
            BinaryOp::Add => a + b,
            BinaryOp::Subtract => a - b,
            BinaryOp::Multiply => a * b,
            BinaryOp::Divide => {
                if b == 0.0 {
                    return Err(ToolError::Math("division by zero".to_string()));
                }
                a / b
            }
            BinaryOp::Power => a.powf(b),
            BinaryOp::Modulus => {
                if b == 0.0 {
                    return Err(ToolError::Math("modulus by zero".to_string()));
                }
                // floored remainder: takes the sign of the divisor
                let r = a % b;
                if r != 0.0 && (r < 0.0) != (b < 0.0) {
                    r + b
                } else {
                    r
                }
            }
        };
        finite(result)
    }
}

fn finite(value: f64) -> Result<f64, ToolError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ToolError::Math(format!("result is not a finite number ({})", value)))
    }
}

/// JSON number, integral when the value allows it
pub(crate) fn number_value(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < 9.0e15 {
        json!(value as i64)
    } else {
        json!(value)
    }
}

#[derive(Deserialize)]
struct BinaryArgs {
    a: f64,
    b: f64,
}

pub struct ArithmeticTool {
    op: BinaryOp,
}

impl ArithmeticTool {
    pub fn new(op: BinaryOp) -> Self {
        Self { op }
    }
}

#[async_trait]
impl ToolTrait for ArithmeticTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(self.op.name(), self.op.description())
            .param("a", ParamKind::Number, "First operand")
            .param("b", ParamKind::Number, "Second operand")
    }

    async fn execute(&self, args: Value) -> Result<ToolPayload, ToolError> {
        let BinaryArgs { a, b } = parse_args(args)?;
        let result = self.op.apply(a, b)?;
        Ok(ToolPayload::Structured(json!({"result": number_value(result)})))
    }
}

#[derive(Deserialize)]
struct SqrtArgs {
    a: f64,
}

pub struct SqrtTool;

#[async_trait]
impl ToolTrait for SqrtTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new("sqrt", "Square root of a non-negative number")
            .param("a", ParamKind::Number, "The number")
    }

    async fn execute(&self, args: Value) -> Result<ToolPayload, ToolError> {
        let SqrtArgs { a } = parse_args(args)?;
        if a < 0.0 {
            return Err(ToolError::Math(format!(
                "square root of negative number {}",
                a
            )));
        }
        let result = finite(a.sqrt())?;
        Ok(ToolPayload::Structured(json!({"result": number_value(result)})))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn run(op: BinaryOp, a: f64, b: f64) -> Result<ToolPayload, ToolError> {
        ArithmeticTool::new(op)
            .execute(json!({"a": a, "b": b}))
            .await
    }

    #[tokio::test]
    async fn test_multiply_integral_result() {
        let payload = run(BinaryOp::Multiply, 17.0, 4.0).await.unwrap();
        assert_eq!(payload, ToolPayload::Structured(json!({"result": 68})));
        assert_eq!(payload.render(), r#"{"result":68}"#);
    }

    #[tokio::test]
    async fn test_divide_fractional_and_by_zero() {
        let payload = run(BinaryOp::Divide, 7.0, 2.0).await.unwrap();
        assert_eq!(payload, ToolPayload::Structured(json!({"result": 3.5})));

        let err = run(BinaryOp::Divide, 1.0, 0.0).await.unwrap_err();
        assert!(err.to_string().contains("division by zero"));
    }

    #[test]
    fn test_modulus_takes_sign_of_divisor() {
        assert_eq!(BinaryOp::Modulus.apply(7.0, 3.0).unwrap(), 1.0);
        assert_eq!(BinaryOp::Modulus.apply(-7.0, 3.0).unwrap(), 2.0);
        assert_eq!(BinaryOp::Modulus.apply(7.0, -3.0).unwrap(), -2.0);
        assert!(BinaryOp::Modulus.apply(7.0, 0.0).is_err());
    }

    #[test]
    fn test_power_overflow_is_error() {
        assert_eq!(BinaryOp::Power.apply(2.0, 10.0).unwrap(), 1024.0);
        assert!(matches!(
            BinaryOp::Power.apply(10.0, 400.0),
            Err(ToolError::Math(_))
        ));
    }

    #[tokio::test]
    async fn test_sqrt() {
        let payload = SqrtTool.execute(json!({"a": 16})).await.unwrap();
        assert_eq!(payload, ToolPayload::Structured(json!({"result": 4})));
        assert!(SqrtTool.execute(json!({"a": -1})).await.is_err());
    }

    #[tokio::test]
    async fn test_non_numeric_argument() {
        let err = ArithmeticTool::new(BinaryOp::Add)
            .execute(json!({"a": "two", "b": 1}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[test]
    fn test_names_unique() {
        let mut names: Vec<&str> = BinaryOp::ALL.iter().map(|op| op.name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), BinaryOp::ALL.len());
    }
}
