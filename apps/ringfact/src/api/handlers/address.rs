//! Content addresses and canonical digests of caller data.

use axum::Json;
use ringfact_core::{DigestSummary, decode_address, encode_address};

use super::required;
use crate::api::error::{ApiError, ApiJson, ApiQuery};
use crate::api::types::{
    AddressDecodeParams, AddressDecodeResponse, AddressEncodeRequest, AddressEncodeResponse,
    CanonicalRequest,
};

/// `POST /address/encode {hex}` or `{text}`
pub async fn address_encode_handler(
    ApiJson(request): ApiJson<AddressEncodeRequest>,
) -> Result<Json<AddressEncodeResponse>, ApiError> {
    let bytes = match (request.hex, request.text) {
        (Some(hex_input), None) => {
            let trimmed = hex_input.trim();
            let trimmed = trimmed.strip_prefix("0x").unwrap_or(trimmed);
            hex::decode(trimmed).map_err(|e| ApiError::param("hex", e.to_string()))?
        }
        (None, Some(text)) => text.into_bytes(),
        _ => return Err(ApiError::param("body", "provide exactly one of 'hex' or 'text'")),
    };
    Ok(Json(AddressEncodeResponse {
        address: encode_address(&bytes),
        hex: hex::encode(&bytes),
        length: bytes.len(),
    }))
}

/// `GET /address/decode?address`
pub async fn address_decode_handler(
    ApiQuery(params): ApiQuery<AddressDecodeParams>,
) -> Result<Json<AddressDecodeResponse>, ApiError> {
    let address = required("address", params.address.as_deref())?;
    let bytes = decode_address(address).map_err(|e| ApiError::from_core(e, "address"))?;
    Ok(Json(AddressDecodeResponse {
        address: address.to_string(),
        hex: hex::encode(&bytes),
        length: bytes.len(),
        text: String::from_utf8(bytes).ok(),
    }))
}

/// `POST /canonical {object}`
pub async fn canonical_handler(
    ApiJson(request): ApiJson<CanonicalRequest>,
) -> Json<DigestSummary> {
    Json(DigestSummary::of(&request.object))
}
