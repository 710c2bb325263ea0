//! # CLI Command Implementations

use crate::api::{self, AppState};
use crate::config::{ConfigError, ServerConfig};
use ringfact_core::{
    Arity, Datum, Derivation, KnowledgeGraph, ObserverRegistry, Operation, Ring, RingfactError,
    derive, execute, validate,
};
use std::path::PathBuf;

/// Map a configuration failure onto the engine's error type.
fn config_error(error: ConfigError) -> RingfactError {
    match error {
        ConfigError::Invalid { key, reason } => RingfactError::param(key, reason),
        ConfigError::Parse(reason) => RingfactError::SerializationError(reason),
        io @ ConfigError::Io { .. } => RingfactError::IoError(io.to_string()),
    }
}

fn print_json(value: &impl serde::Serialize) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_default()
    );
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(
    host: &str,
    port: u16,
    config_path: Option<PathBuf>,
    observers: Option<PathBuf>,
) -> Result<(), RingfactError> {
    let mut config = ServerConfig::load(config_path.as_deref()).map_err(config_error)?;
    if observers.is_some() {
        config.observers_path = observers;
    }

    let registry = match &config.observers_path {
        Some(path) => ObserverRegistry::with_redb(path)?,
        None => ObserverRegistry::new(),
    };

    println!("ringfact Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:      {}", host);
    println!("  Port:      {}", port);
    println!(
        "  Config:    {}",
        config_path
            .as_ref()
            .map_or_else(|| "(defaults + environment)".to_string(), |p| p.display().to_string())
    );
    println!(
        "  Observers: {}",
        config
            .observers_path
            .as_ref()
            .map_or_else(|| "in memory".to_string(), |p| p.display().to_string())
    );
    println!(
        "  Gateways:  {} (default: {})",
        config
            .gateways
            .iter()
            .map(|g| g.name.as_str())
            .collect::<Vec<_>>()
            .join(", "),
        config.default_gateway
    );
    println!();
    println!("Endpoints:");
    println!("  GET  /kernel/op       - Evaluate one operation");
    println!("  POST /derive          - Derive a term");
    println!("  GET  /certify         - Certify a derivation id");
    println!("  GET  /graph/query     - Query the knowledge graph");
    println!("  POST /store/write     - Seal and store an object");
    println!("  GET  /store/read/{{id}} - Fetch and verify an object");
    println!("  POST /observers       - Register an observer");
    println!("  GET  /health          - Health check");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let state = AppState::new(config, registry)
        .map_err(|e| RingfactError::IoError(e.to_string()))?;
    let addr = format!("{}:{}", host, port);
    api::run_server(&addr, state).await
}

// =============================================================================
// KERNEL COMMANDS
// =============================================================================

/// Evaluate one operation.
pub fn cmd_compute(
    op_name: &str,
    x: u64,
    y: Option<u64>,
    quantum: u32,
    json_mode: bool,
    verbose: bool,
) -> Result<(), RingfactError> {
    let ring = Ring::new(quantum)?;
    let op = Operation::from_name(op_name)
        .ok_or_else(|| RingfactError::param("op", format!("unknown operation '{}'", op_name)))?;
    let x = ring.element(x, "x")?;
    let operands = match (op.arity(), y) {
        (Arity::Unary, None) => vec![x],
        (Arity::Binary, Some(y)) => vec![x, ring.element(y, "y")?],
        (Arity::Unary, Some(_)) => {
            return Err(RingfactError::param("y", format!("{} is unary", op_name)));
        }
        (Arity::Binary, None) => {
            return Err(RingfactError::param("y", format!("{} requires y", op_name)));
        }
    };
    let derivation = Derivation::of_operation(op, &operands, ring)?;

    if json_mode {
        print_json(&derivation);
        return Ok(());
    }

    println!("{} = {}  (n={})", derivation.canonical_term, derivation.result, quantum);
    println!("Address:    {}", derivation.result_address);
    println!("Derivation: {}", derivation.derivation_id);
    println!("Grade:      {} ({})", derivation.grade, derivation.grade.label());
    if verbose {
        let datum = Datum::new(ring, derivation.result);
        println!();
        println!("Datum:");
        println!("  Bytes:     {}", hex::encode(&datum.bytes));
        println!("  Stratum:   {:?}", datum.stratum);
        println!("  Spectrum:  {:?}", datum.spectrum);
        println!("  Partition: {:?}", datum.partition);
    }
    Ok(())
}

/// Derive a term.
pub fn cmd_derive(term: &str, quantum: u32, json_mode: bool) -> Result<(), RingfactError> {
    let derivation = derive(term, Ring::new(quantum)?)?;
    if json_mode {
        print_json(&derivation);
        return Ok(());
    }
    println!("Term:       {}", derivation.original_term);
    println!("Canonical:  {}", derivation.canonical_term);
    println!("Result:     {}  (n={})", derivation.result, derivation.quantum);
    println!("Address:    {}", derivation.result_address);
    println!("Derivation: {}", derivation.derivation_id);
    Ok(())
}

/// Check the critical identity.
pub fn cmd_identity(quantum: u32, x: Option<u64>, json_mode: bool) -> Result<(), RingfactError> {
    let ring = Ring::for_existence(quantum)?;
    match x {
        Some(x) => {
            let witness = ring.identity_at(ring.element(x, "x")?);
            if json_mode {
                print_json(&witness);
            } else {
                println!(
                    "neg(bnot({})) = neg({}) = {}; succ({}) = {}  [{}]",
                    witness.x,
                    witness.bnot_x,
                    witness.neg_bnot_x,
                    witness.x,
                    witness.succ_x,
                    if witness.holds { "holds" } else { "FAILS" }
                );
            }
        }
        None => {
            let report = ring.verify_critical_identity();
            if json_mode {
                print_json(&report);
            } else {
                println!(
                    "neg(bnot(x)) = succ(x) over Z/2^{}: {} ({:?}, {} elements checked)",
                    report.quantum,
                    if report.holds { "holds" } else { "FAILS" },
                    report.method,
                    report.checked
                );
                for counterexample in &report.counterexamples {
                    println!("  counterexample: {}", counterexample);
                }
            }
        }
    }
    Ok(())
}

// =============================================================================
// GRAPH COMMANDS
// =============================================================================

/// Run a query against the default ring's graph.
pub fn cmd_query(query: &str, json_mode: bool) -> Result<(), RingfactError> {
    let graph = KnowledgeGraph::build(Ring::default());
    let result = execute(&graph, query)?;
    if json_mode {
        print_json(&result);
        return Ok(());
    }
    for warning in &result.warnings {
        eprintln!("warning: {}", warning);
    }
    println!("{}", result.variables.join("\t"));
    for row in &result.rows {
        let cells: Vec<&str> = result
            .variables
            .iter()
            .map(|v| row.get(v).map_or("", |o| o.lexical()))
            .collect();
        println!("{}", cells.join("\t"));
    }
    println!();
    println!("{} of {} rows", result.rows.len(), result.total);
    Ok(())
}

/// Run the conformance battery. Fails when any check fails.
pub fn cmd_validate(quantum: u32, json_mode: bool, verbose: bool) -> Result<(), RingfactError> {
    let report = validate(Ring::new(quantum)?);
    if json_mode {
        print_json(&report);
    } else {
        println!("Conformance of Z/2^{} (modulus {})", report.quantum, report.modulus);
        println!("==============================");
        for check in &report.checks {
            println!(
                "  [{}] {:<28} {} checked",
                if check.conformant { "ok" } else { "FAIL" },
                check.name,
                check.checked
            );
            if verbose {
                println!("        {}", check.description);
            }
            if !check.violations.is_empty() {
                println!("        violations: {:?}", check.violations);
            }
        }
        println!();
        println!("{} / {} checks passed", report.passed(), report.checks.len());
    }
    if report.conformant {
        Ok(())
    } else {
        Err(RingfactError::IoError(format!(
            "{} of {} conformance checks failed",
            report.checks.len() - report.passed(),
            report.checks.len()
        )))
    }
}
