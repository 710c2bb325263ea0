//! Ring kernel endpoints: one operation, one datum, partition, identity.

use axum::{
    Json,
    extract::Path,
    http::{HeaderValue, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use ringfact_core::{Arity, Datum, Derivation, Grade, Operation, Ring, element_address};

use super::{int_param, quantum_param, required, ring_param};
use crate::api::error::{ApiError, ApiQuery};
use crate::api::types::{
    DatumResponse, ElementParams, IdentityResponse, OpParams, OperationResponse,
    PartitionResponse,
};

const CRITICAL_IDENTITY: &str = "neg(bnot(x)) = succ(x)";

fn operation_names() -> String {
    Operation::ALL
        .iter()
        .map(|op| op.name())
        .collect::<Vec<_>>()
        .join(", ")
}

/// `GET /kernel/op?op&x&y&n`
pub async fn op_handler(
    ApiQuery(params): ApiQuery<OpParams>,
) -> Result<Json<OperationResponse>, ApiError> {
    let ring = ring_param(params.n.as_deref())?;
    let name = required("op", params.op.as_deref())?;
    let op = Operation::from_name(name).ok_or_else(|| {
        ApiError::param(
            "op",
            format!("unknown operation '{}'; expected one of {}", name, operation_names()),
        )
    })?;
    let x = ring.element(int_param("x", required("x", params.x.as_deref())?)?, "x")?;

    let y = params.y.as_deref().map(str::trim).filter(|y| !y.is_empty());
    let operands = match (op.arity(), y) {
        (Arity::Unary, None) => vec![x],
        (Arity::Unary, Some(_)) => {
            return Err(ApiError::param("y", format!("{} is unary and takes no y", op.name())));
        }
        (Arity::Binary, Some(y)) => vec![x, ring.element(int_param("y", y)?, "y")?],
        (Arity::Binary, None) => {
            return Err(ApiError::param("y", format!("{} requires y", op.name())));
        }
    };

    let derivation = Derivation::of_operation(op, &operands, ring)?;
    Ok(Json(OperationResponse {
        op: op.name().to_string(),
        operands,
        quantum: ring.quantum(),
        modulus: ring.modulus(),
        result: derivation.result,
        address: derivation.result_address.clone(),
        datum: Datum::new(ring, derivation.result),
        derivation_id: derivation.derivation_id,
        canonical_term: derivation.canonical_term,
        grade: Grade::A.info(),
    }))
}

/// `GET /kernel/datum?x&n`
pub async fn datum_handler(
    ApiQuery(params): ApiQuery<ElementParams>,
) -> Result<Json<DatumResponse>, ApiError> {
    let ring = ring_param(params.n.as_deref())?;
    let x = ring.element(int_param("x", required("x", params.x.as_deref())?)?, "x")?;
    Ok(Json(DatumResponse {
        address: element_address(ring, x),
        datum: Datum::new(ring, x),
        grade: Grade::A.info(),
    }))
}

/// `GET /kernel/partition?n[&x]`
pub async fn partition_handler(
    ApiQuery(params): ApiQuery<ElementParams>,
) -> Result<Json<PartitionResponse>, ApiError> {
    let ring = ring_param(params.n.as_deref())?;
    let x = match params.x.as_deref() {
        Some(raw) => Some(ring.element(int_param("x", raw)?, "x")?),
        None => None,
    };
    let counts = ring.partition();
    Ok(Json(PartitionResponse {
        quantum: ring.quantum(),
        modulus: ring.modulus(),
        total: counts.total(),
        counts,
        x,
        class: x.map(|x| ring.classify(x)),
    }))
}

/// `GET /kernel/identity?n[&x]`
///
/// Accepts quanta up to 32; rings beyond 16 bits are sampled.
pub async fn identity_handler(
    ApiQuery(params): ApiQuery<ElementParams>,
) -> Result<Json<IdentityResponse>, ApiError> {
    let ring = Ring::for_existence(quantum_param(params.n.as_deref())?)?;
    let response = match params.x.as_deref() {
        Some(raw) => {
            let witness = ring.identity_at(ring.element(int_param("x", raw)?, "x")?);
            IdentityResponse {
                quantum: ring.quantum(),
                identity: CRITICAL_IDENTITY.to_string(),
                holds: witness.holds,
                witness: Some(witness),
                report: None,
            }
        }
        None => {
            let report = ring.verify_critical_identity();
            IdentityResponse {
                quantum: ring.quantum(),
                identity: CRITICAL_IDENTITY.to_string(),
                holds: report.holds,
                witness: None,
                report: Some(report),
            }
        }
    };
    Ok(Json(response))
}

/// `GET /ring/{*rest}`: permanent redirect to `/kernel/{rest}`.
pub async fn ring_alias_handler(Path(rest): Path<String>, uri: Uri) -> Result<Response, ApiError> {
    let location = match uri.query() {
        Some(query) => format!("/kernel/{}?{}", rest, query),
        None => format!("/kernel/{}", rest),
    };
    let location = HeaderValue::from_str(&location)
        .map_err(|_| ApiError::param("path", "cannot be redirected"))?;
    Ok((
        StatusCode::MOVED_PERMANENTLY,
        [(header::LOCATION, location)],
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op_params(op: &str, x: &str, y: Option<&str>) -> ApiQuery<OpParams> {
        ApiQuery(OpParams {
            op: Some(op.to_string()),
            x: Some(x.to_string()),
            y: y.map(str::to_string),
            n: None,
        })
    }

    #[tokio::test]
    async fn add_wraps() {
        let Json(r) = op_handler(op_params("add", "200", Some("100"))).await.expect("add");
        assert_eq!(r.result, 44);
        assert_eq!(r.grade.grade, Grade::A);
        assert!(r.derivation_id.starts_with("urn:uor:derivation:sha256:"));
    }

    #[tokio::test]
    async fn unary_rejects_y_and_binary_requires_it() {
        let err = op_handler(op_params("neg", "1", Some("2"))).await.expect_err("unary");
        assert!(matches!(err, ApiError::InvalidParameter { ref param, .. } if param == "y"));
        let err = op_handler(op_params("mul", "1", None)).await.expect_err("binary");
        assert!(matches!(err, ApiError::InvalidParameter { ref param, .. } if param == "y"));
    }

    #[tokio::test]
    async fn operands_are_checked_against_the_ring() {
        let err = op_handler(op_params("add", "256", Some("1"))).await.expect_err("x");
        assert!(matches!(err, ApiError::InvalidParameter { ref param, .. } if param == "x"));
        let err = op_handler(op_params("add", "1", Some("999"))).await.expect_err("y");
        assert!(matches!(err, ApiError::InvalidParameter { ref param, .. } if param == "y"));
        let err = op_handler(op_params("pow", "1", Some("1"))).await.expect_err("op");
        assert!(matches!(err, ApiError::InvalidParameter { ref param, .. } if param == "op"));
    }

    #[tokio::test]
    async fn identity_at_42() {
        let Json(r) = identity_handler(ApiQuery(ElementParams {
            x: Some("42".into()),
            n: None,
        }))
        .await
        .expect("identity");
        let witness = r.witness.expect("witness");
        assert_eq!((witness.bnot_x, witness.neg_bnot_x, witness.succ_x), (213, 43, 43));
        assert!(r.holds);
    }

    #[tokio::test]
    async fn identity_accepts_wide_rings() {
        let Json(r) = identity_handler(ApiQuery(ElementParams {
            x: None,
            n: Some("32".into()),
        }))
        .await
        .expect("n=32");
        assert!(r.holds);
        assert!(r.report.is_some());
    }
}
