//! Contract endpoints the view binding talks to.
//!
//! A panel is one (address, required network, method set) triple. It turns a method
//! name plus user-entered arguments into an [`OperationRequest`], attaching the
//! configured fee for payable methods.

use crate::{
    config::{
        MethodConfig,
        PanelConfig,
    },
    operation::{
        OperationKind,
        OperationRequest,
    },
    provider::{
        NetworkId,
        Value,
    },
};
use alloy_json_abi::Function;
use alloy_primitives::{
    Address,
    U256,
    utils::parse_ether,
};
use std::collections::HashSet;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PanelError {
    #[error("invalid method signature `{signature}`: {reason}")]
    InvalidSignature { signature: String, reason: String },
    #[error("method `{0}` declared more than once")]
    DuplicateMethod(String),
    #[error("read method `{0}` cannot carry a fee")]
    FeeOnRead(String),
    #[error("invalid fee `{fee}` for `{method}`: {reason}")]
    InvalidFee {
        method: String,
        fee: String,
        reason: String,
    },
    #[error("panel `{panel}` has no method `{method}`")]
    UnknownMethod { panel: String, method: String },
    #[error("`{method}` takes {expected} argument(s), got {actual}")]
    ArgumentCount {
        method: String,
        expected: usize,
        actual: usize,
    },
}

#[derive(Clone, Debug)]
pub struct Method {
    pub name: String,
    pub signature: String,
    pub kind: OperationKind,
    /// Wei attached to every call.
    pub fee: Option<U256>,
    function: Function,
}

impl Method {
    fn from_config(config: &MethodConfig) -> Result<Self, PanelError> {
        let function = Function::parse(&config.signature).map_err(|e| {
            PanelError::InvalidSignature {
                signature: config.signature.clone(),
                reason: e.to_string(),
            }
        })?;
        let fee = match (&config.fee, config.kind) {
            (None, _) => None,
            (Some(_), OperationKind::Read) => {
                return Err(PanelError::FeeOnRead(function.name.clone()));
            }
            (Some(fee), OperationKind::Write) => Some(parse_fee(fee).map_err(|reason| {
                PanelError::InvalidFee {
                    method: function.name.clone(),
                    fee: fee.clone(),
                    reason,
                }
            })?),
        };
        Ok(Self {
            name: function.name.clone(),
            signature: config.signature.clone(),
            kind: config.kind,
            fee,
            function,
        })
    }

    pub fn arity(&self) -> usize {
        self.function.inputs.len()
    }
}

/// Converts an ether-denominated decimal string to wei.
pub fn parse_fee(fee: &str) -> Result<U256, String> {
    parse_ether(fee.trim()).map_err(|e| e.to_string())
}

#[derive(Clone, Debug)]
pub struct Panel {
    pub name: String,
    pub address: Address,
    pub required_network: NetworkId,
    methods: Vec<Method>,
}

impl Panel {
    /// Builds the panel; `default_network` applies when the config names none.
    pub fn from_config(
        config: &PanelConfig,
        default_network: NetworkId,
    ) -> Result<Self, PanelError> {
        let mut seen = HashSet::new();
        let mut methods = Vec::with_capacity(config.methods.len());
        for method in &config.methods {
            let method = Method::from_config(method)?;
            if !seen.insert(method.name.clone()) {
                return Err(PanelError::DuplicateMethod(method.name));
            }
            methods.push(method);
        }
        Ok(Self {
            name: config.name.clone(),
            address: config.address,
            required_network: config.required_network.unwrap_or(default_network),
            methods,
        })
    }

    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    pub fn method(&self, name: &str) -> Result<&Method, PanelError> {
        self.methods
            .iter()
            .find(|m| m.name == name)
            .ok_or_else(|| PanelError::UnknownMethod {
                panel: self.name.clone(),
                method: name.to_owned(),
            })
    }

    pub fn request(
        &self,
        method: &str,
        args: Vec<Value>,
    ) -> Result<OperationRequest, PanelError> {
        let method = self.method(method)?;
        if args.len() != method.arity() {
            return Err(PanelError::ArgumentCount {
                method: method.name.clone(),
                expected: method.arity(),
                actual: args.len(),
            });
        }
        let request = match method.kind {
            OperationKind::Read => {
                OperationRequest::read(self.address, &method.signature, args)
            }
            OperationKind::Write => {
                OperationRequest::write(self.address, &method.signature, args)
            }
        };
        Ok(match method.fee {
            Some(fee) => request.with_value(fee),
            None => request,
        })
    }
}
