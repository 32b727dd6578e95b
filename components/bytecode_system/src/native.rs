//! Native call ABI shared by the compiler and the machine
//!
//! A native is declared by name, parameter type expressions and an optional
//! result type expression. Its index in the host table is the operand of
//! `CALL_NATIVE`.

/// Declaration of a host function reachable through `CALL_NATIVE`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeSignature {
    /// Callable name
    pub name: &'static str,
    /// Parameter types, written in source type syntax
    pub params: Vec<&'static str>,
    /// Result type for functions, `None` for procedures
    pub result: Option<&'static str>,
}

impl NativeSignature {
    /// Declare a native function
    pub fn function(name: &'static str, params: &[&'static str], result: &'static str) -> Self {
        Self {
            name,
            params: params.to_vec(),
            result: Some(result),
        }
    }

    /// Declare a native procedure
    pub fn procedure(name: &'static str, params: &[&'static str]) -> Self {
        Self {
            name,
            params: params.to_vec(),
            result: None,
        }
    }

    /// Whether this native is called as a procedure
    pub fn is_procedure(&self) -> bool {
        self.result.is_none()
    }
}
