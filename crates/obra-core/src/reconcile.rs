//! Numeric reconciliation of analysis records.
//!
//! The model supplies prices; this module owns the arithmetic built on
//! top of them. Per line item the difference and difference percentage
//! are recomputed from the contract and market unit costs. The summary
//! block is only re-rounded: its totals remain the model's
//! responsibility, and [`summary_drift`] reports when they disagree with
//! the line items.

use serde::Serialize;

use crate::records::{AnalysisPartida, AnalysisRecord, Amount, ResumenGeneral};

/// Decimal places for currency values.
pub const CURRENCY_PLACES: u32 = 2;

/// Decimal places for percentages.
pub const PERCENT_PLACES: u32 = 4;

/// Smallest summary/line-item disagreement worth reporting.
pub const DRIFT_TOLERANCE: f64 = 0.01;

/// Round to `places` decimals, ties to even on the exact binary value.
///
/// Formatting with a fixed precision is exact in Rust, so `0.125` goes to
/// `0.12` while `2.675` (really `2.67499...`) goes to `2.67`. Going through
/// the decimal text also avoids scaling by `10^places`, which overflows
/// for large magnitudes.
pub fn round_to(value: f64, places: u32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let rounded = format!("{:.*}", places as usize, value)
        .parse::<f64>()
        .unwrap_or(value);
    // Normalise -0.0 so it serializes as 0.0
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// Reconcile a record in place and hand it back for chaining.
pub fn reconcile(record: &mut AnalysisRecord) -> &mut AnalysisRecord {
    reconcile_summary(&mut record.resumen_general);
    for partida in &mut record.partidas {
        reconcile_partida(partida);
    }
    record
}

fn reconcile_summary(resumen: &mut ResumenGeneral) {
    for field in [
        &mut resumen.costo_en_contrato,
        &mut resumen.precio_estimado_mercado,
        &mut resumen.diferencia_total,
    ] {
        if let Some(amount) = field.as_mut() {
            *amount = amount.rounded(CURRENCY_PLACES);
        }
    }
    if let Some(amount) = resumen.diferencia_porcentaje.as_mut() {
        *amount = amount.rounded(PERCENT_PLACES);
    }
}

fn reconcile_partida(partida: &mut AnalysisPartida) {
    // A missing price is a zero price, and is written out as such
    let contrato = partida
        .costo_en_contrato
        .get_or_insert_with(Amount::default)
        .value_or_zero();
    let mercado = partida
        .precio_estimado_mercado
        .get_or_insert_with(Amount::default)
        .value_or_zero();

    let (diferencia, porcentaje) = if contrato == 0.0 {
        (0.0, 0.0)
    } else {
        let diferencia = mercado - contrato;
        (diferencia, diferencia / contrato * 100.0)
    };

    partida.diferencia = Some(Amount::Number(round_to(diferencia, CURRENCY_PLACES)));
    partida.diferencia_porcentaje = Some(Amount::Number(round_to(porcentaje, PERCENT_PLACES)));

    for field in [
        &mut partida.costo_en_contrato,
        &mut partida.precio_estimado_mercado,
    ] {
        if let Some(amount) = field.as_mut() {
            *amount = amount.rounded(CURRENCY_PLACES);
        }
    }
}

/// Disagreement between the summary totals and the line items.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryDrift {
    /// Σ quantity × contract unit cost
    pub contrato_partidas: f64,
    /// Σ quantity × market unit price
    pub mercado_partidas: f64,
    /// Summary contract total minus the line-item sum, when numeric
    pub contrato_delta: Option<f64>,
    /// Summary market total minus the line-item sum, when numeric
    pub mercado_delta: Option<f64>,
}

/// Compare `resumen_general` with the sums implied by the line items.
///
/// Returns `None` when every numeric summary total is within
/// [`DRIFT_TOLERANCE`] of its line-item sum. Records with no line items
/// never drift. The record is not modified.
pub fn summary_drift(record: &AnalysisRecord) -> Option<SummaryDrift> {
    if record.partidas.is_empty() {
        return None;
    }

    let contrato_partidas = round_to(
        weighted_sum(&record.partidas, |p| p.costo_en_contrato.as_ref()),
        CURRENCY_PLACES,
    );
    let mercado_partidas = round_to(
        weighted_sum(&record.partidas, |p| p.precio_estimado_mercado.as_ref()),
        CURRENCY_PLACES,
    );

    let delta = |total: &Option<Amount>, sum: f64| {
        total
            .as_ref()
            .and_then(Amount::as_f64)
            .map(|t| round_to(t - sum, CURRENCY_PLACES))
            .filter(|d| d.abs() > DRIFT_TOLERANCE)
    };
    let contrato_delta = delta(&record.resumen_general.costo_en_contrato, contrato_partidas);
    let mercado_delta = delta(
        &record.resumen_general.precio_estimado_mercado,
        mercado_partidas,
    );

    if contrato_delta.is_none() && mercado_delta.is_none() {
        return None;
    }

    Some(SummaryDrift {
        contrato_partidas,
        mercado_partidas,
        contrato_delta,
        mercado_delta,
    })
}

fn weighted_sum(
    partidas: &[AnalysisPartida],
    price: impl Fn(&AnalysisPartida) -> Option<&Amount>,
) -> f64 {
    partidas
        .iter()
        .map(|p| p.cantidad.value_or_zero() * price(p).map_or(0.0, Amount::value_or_zero))
        .sum()
}
