//! ABI helpers for calls described by Solidity signatures.

use crate::provider::{
    Payload,
    ProviderError,
    ProviderResult,
    Value,
};
use alloy_dyn_abi::{
    DynSolType,
    DynSolValue,
    FunctionExt,
    JsonAbiExt,
};
use alloy_json_abi::Function;
use alloy_primitives::Bytes;

pub fn parse_function(signature: &str) -> ProviderResult<Function> {
    Function::parse(signature)
        .map_err(|e| ProviderError::Encoding(format!("invalid signature `{signature}`: {e}")))
}

/// ABI-encodes `args` as calldata for `function`, selector included. String arguments
/// are coerced to the parameter type, so user input can be passed through untouched.
pub fn encode_call(function: &Function, args: &[Value]) -> ProviderResult<Bytes> {
    if args.len() != function.inputs.len() {
        return Err(ProviderError::Encoding(format!(
            "{} expects {} argument(s), got {}",
            function.name,
            function.inputs.len(),
            args.len()
        )));
    }
    let values = std::iter::zip(&function.inputs, args)
        .map(|(param, arg)| {
            let ty = DynSolType::parse(&param.selector_type())
                .map_err(|e| ProviderError::Encoding(e.to_string()))?;
            coerce_value(&ty, arg)
        })
        .collect::<ProviderResult<Vec<_>>>()?;
    let data = function
        .abi_encode_input(&values)
        .map_err(|e| ProviderError::Encoding(e.to_string()))?;
    Ok(data.into())
}

pub fn decode_output(function: &Function, data: &[u8]) -> ProviderResult<Payload> {
    let values = function
        .abi_decode_output(data)
        .map_err(|e| ProviderError::Decoding(format!("{}: {e}", function.name)))?;
    Ok(values.into_iter().map(into_value).collect())
}

fn coerce_value(ty: &DynSolType, value: &Value) -> ProviderResult<DynSolValue> {
    match (ty, value) {
        (DynSolType::Uint(bits), Value::Uint(v)) => Ok(DynSolValue::Uint(*v, *bits)),
        (DynSolType::Bool, Value::Bool(v)) => Ok(DynSolValue::Bool(*v)),
        (DynSolType::Address, Value::Address(v)) => Ok(DynSolValue::Address(*v)),
        (DynSolType::String, Value::String(v)) => Ok(DynSolValue::String(v.clone())),
        (DynSolType::Bytes, Value::Bytes(v)) => Ok(DynSolValue::Bytes(v.to_vec())),
        (_, Value::SessionAccount) => Err(ProviderError::Encoding(
            "session account placeholder was never bound".into(),
        )),
        (ty, Value::String(raw)) => ty.coerce_str(raw).map_err(|e| {
            ProviderError::Encoding(format!("cannot read `{raw}` as {ty}: {e}"))
        }),
        (ty, other) => Err(ProviderError::Encoding(format!(
            "{other} is not a valid {ty}"
        ))),
    }
}

fn into_value(value: DynSolValue) -> Value {
    match value {
        DynSolValue::Uint(v, _) => Value::Uint(v),
        DynSolValue::Bool(v) => Value::Bool(v),
        DynSolValue::Address(v) => Value::Address(v),
        DynSolValue::String(v) => Value::String(v),
        DynSolValue::Bytes(v) => Value::Bytes(v.into()),
        DynSolValue::FixedBytes(word, size) => {
            Value::Bytes(Bytes::copy_from_slice(&word[..size]))
        }
        other => Value::String(format!("{other:?}")),
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use alloy_primitives::{
        Address,
        U256,
    };

    #[test]
    fn encode_call__string_arguments__coerced_to_parameter_types() {
        // given
        let function = parse_function("claimBall(uint256,string)").unwrap();
        let args = vec![Value::from("3"), Value::from("atlantis")];

        // when
        let data = encode_call(&function, &args).unwrap();

        // then
        let expected = function
            .abi_encode_input(&[
                DynSolValue::Uint(U256::from(3), 256),
                DynSolValue::String("atlantis".into()),
            ])
            .unwrap();
        assert_eq!(data.as_ref(), expected.as_slice());
        assert_eq!(&data[..4], function.selector().as_slice());
    }

    #[test]
    fn encode_call__unparsable_argument__fails_with_encoding() {
        let function = parse_function("attackBall(uint256,uint256)").unwrap();
        let err = encode_call(&function, &["many".into(), 1u64.into()]).unwrap_err();
        assert!(matches!(err, ProviderError::Encoding(_)));
    }

    #[test]
    fn encode_call__unbound_session_account__fails_with_encoding() {
        let function = parse_function("userPoints(address,string)").unwrap();
        let err =
            encode_call(&function, &[Value::SessionAccount, "atlantis".into()]).unwrap_err();
        assert!(matches!(err, ProviderError::Encoding(_)));
    }

    #[test]
    fn encode_call__wrong_arity__fails_with_encoding() {
        let function = parse_function("balls(uint256)").unwrap();
        assert!(encode_call(&function, &[]).is_err());
    }

    #[test]
    fn decode_output__ball_tuple__returns_values_in_order() {
        // given
        let function =
            parse_function("balls(uint256) returns (address,uint256,string)").unwrap();
        let owner = Address::repeat_byte(0x11);
        let encoded = DynSolValue::Tuple(vec![
            DynSolValue::Address(owner),
            DynSolValue::Uint(U256::from(42), 256),
            DynSolValue::String("atlantis".into()),
        ])
        .abi_encode_params();

        // when
        let payload = decode_output(&function, &encoded).unwrap();

        // then
        assert_eq!(
            payload,
            vec![
                Value::Address(owner),
                Value::Uint(U256::from(42)),
                Value::String("atlantis".into()),
            ]
        );
    }

    #[test]
    fn decode_output__truncated_data__fails_with_decoding() {
        let function = parse_function("userPoints(address,string) returns (uint256)").unwrap();
        let err = decode_output(&function, &[0u8; 5]).unwrap_err();
        assert!(matches!(err, ProviderError::Decoding(_)));
    }
}
