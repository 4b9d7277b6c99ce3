//! Differential privacy via the Laplace mechanism
//!
//! Numeric columns receive Laplace noise with scale `sensitivity / epsilon`,
//! either per cell ([`NoiseMechanism::Record`]) or on the column sum
//! ([`NoiseMechanism::Aggregate`]). Categorical columns are left alone unless
//! randomized response is enabled. Nulls always pass through untouched.
//!
//! All randomness comes from a single [`StdRng`] seeded from the configured
//! seed, or from a fresh seed that is recorded in the summary so the output
//! can be reproduced.

use crate::domain::errors::SafeDataError;
use crate::domain::qi::QuasiIdentifierSpec;
use crate::domain::table::{Column, ColumnKind, DatasetTable, Value};
use crate::domain::Result;
use crate::privacy::config::{DifferentialPrivacyParams, NoiseMechanism};
use crate::privacy::summary::{
    DifferentialPrivacySummary, NoisyAggregate, PrivacySummary, ProtectedResult,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;

/// Draw one sample from Laplace(0, `scale`) by inverse CDF
///
/// `u` is uniform on the open interval `(-0.5, 0.5)`; the endpoint is
/// resampled so the logarithm stays finite.
pub fn sample_laplace<R: Rng + ?Sized>(rng: &mut R, scale: f64) -> f64 {
    loop {
        let u: f64 = rng.gen_range(-0.5..0.5);
        if u.abs() < 0.5 {
            return -scale * u.signum() * (1.0 - 2.0 * u.abs()).ln();
        }
    }
}

/// Probability of reporting the true value under k-ary randomized response
pub fn keep_probability(epsilon: f64, domain_size: usize) -> f64 {
    let e = epsilon.exp();
    e / (e + domain_size as f64 - 1.0)
}

/// Apply differential privacy to `table`
///
/// Every numeric column not listed in `excluded_columns` receives Laplace
/// noise of scale `sensitivity / epsilon`, per cell or on the column sum
/// depending on the mechanism. Categorical columns pass through unless
/// randomized response is enabled.
///
/// # Arguments
///
/// * `table` - Source table, left untouched
/// * `qi` - Quasi-identifier and sensitive columns
/// * `params` - Epsilon, sensitivity, mechanism and optional fixed seed
///
/// # Returns
///
/// The perturbed table and a [`PrivacySummary::DifferentialPrivacy`] carrying
/// the per-column noise scale and the seed used, fixed or freshly drawn.
///
/// # Errors
///
/// Returns [`SafeDataError::Configuration`] if an excluded column or a QI
/// column is missing from the table.
pub fn perturb(
    table: &DatasetTable,
    qi: &QuasiIdentifierSpec,
    params: &DifferentialPrivacyParams,
) -> Result<ProtectedResult> {
    qi.validate_against(table)?;
    if let Some(missing) = params
        .excluded_columns()
        .iter()
        .find(|c| !table.has_column(c))
    {
        return Err(SafeDataError::Configuration(format!(
            "Excluded column '{missing}' not found in dataset"
        )));
    }

    let seed = params.seed().unwrap_or_else(|| rand::thread_rng().gen());
    let mut rng = StdRng::seed_from_u64(seed);
    let scale = params.noise_scale();

    let mut noise_scales = BTreeMap::new();
    let mut randomized = BTreeMap::new();
    let mut aggregates = BTreeMap::new();
    let mut replacements = Vec::new();

    for column in table.columns() {
        if params.is_excluded(column.name()) {
            continue;
        }

        match column.kind() {
            ColumnKind::Numeric => {
                let perturbed = match params.mechanism() {
                    NoiseMechanism::Record => perturb_records(column, scale, &mut rng)?,
                    NoiseMechanism::Aggregate => {
                        let (perturbed, aggregate) = perturb_aggregate(column, scale, &mut rng)?;
                        aggregates.insert(column.name().to_string(), aggregate);
                        perturbed
                    }
                };
                noise_scales.insert(column.name().to_string(), scale);
                replacements.push(perturbed);
            }
            ColumnKind::Categorical if params.randomized_response() => {
                if let Some((perturbed, keep)) =
                    randomized_response(column, params.epsilon(), &mut rng)?
                {
                    randomized.insert(column.name().to_string(), keep);
                    replacements.push(perturbed);
                }
            }
            ColumnKind::Categorical => {}
        }
    }

    let protected = table.with_columns(replacements)?;

    tracing::info!(
        epsilon = params.epsilon(),
        sensitivity = params.sensitivity(),
        mechanism = ?params.mechanism(),
        numeric_columns = noise_scales.len(),
        categorical_columns = randomized.len(),
        seed_fixed = params.seed().is_some(),
        "Differential privacy applied"
    );

    let summary = DifferentialPrivacySummary {
        epsilon: params.epsilon(),
        sensitivity: params.sensitivity(),
        mechanism: params.mechanism(),
        seed,
        seed_was_fixed: params.seed().is_some(),
        noise_scales,
        randomized_response: randomized,
        aggregates,
        excluded_columns: params.excluded_columns().to_vec(),
    };

    Ok(ProtectedResult {
        table: protected,
        summary: PrivacySummary::DifferentialPrivacy(summary),
        recoding: None,
    })
}

fn perturb_records(column: &Column, scale: f64, rng: &mut StdRng) -> Result<Column> {
    let values: Vec<Value> = column
        .values()
        .iter()
        .map(|value| match value {
            Value::Number(n) => Value::Number(n + sample_laplace(rng, scale)),
            other => other.clone(),
        })
        .collect();
    Column::new(column.name(), ColumnKind::Numeric, values)
}

fn perturb_aggregate(
    column: &Column,
    scale: f64,
    rng: &mut StdRng,
) -> Result<(Column, NoisyAggregate)> {
    let count = column.numbers().count();
    let noisy_sum = column.numbers().sum::<f64>() + sample_laplace(rng, scale);
    let noisy_mean = if count == 0 {
        0.0
    } else {
        noisy_sum / count as f64
    };

    let values: Vec<Value> = column
        .values()
        .iter()
        .map(|value| match value {
            Value::Number(_) => Value::Number(noisy_mean),
            other => other.clone(),
        })
        .collect();

    Ok((
        Column::new(column.name(), ColumnKind::Numeric, values)?,
        NoisyAggregate {
            count,
            noisy_sum,
            noisy_mean,
        },
    ))
}

/// k-ary randomized response; `None` when the domain has fewer than two values
fn randomized_response(
    column: &Column,
    epsilon: f64,
    rng: &mut StdRng,
) -> Result<Option<(Column, f64)>> {
    let domain: Vec<Value> = column
        .values()
        .iter()
        .filter(|v| !v.is_null())
        .map(|v| (v.key(), v.clone()))
        .collect::<BTreeMap<_, _>>()
        .into_values()
        .collect();

    if domain.len() < 2 {
        return Ok(None);
    }

    let keep = keep_probability(epsilon, domain.len());
    let positions: BTreeMap<String, usize> = domain
        .iter()
        .enumerate()
        .map(|(i, v)| (v.key(), i))
        .collect();

    let values: Vec<Value> = column
        .values()
        .iter()
        .map(|value| {
            let Some(&own) = positions.get(&value.key()) else {
                return value.clone();
            };
            if rng.gen::<f64>() < keep {
                value.clone()
            } else {
                let mut other = rng.gen_range(0..domain.len() - 1);
                if other >= own {
                    other += 1;
                }
                domain[other].clone()
            }
        })
        .collect();

    Ok(Some((
        Column::new(column.name(), ColumnKind::Categorical, values)?,
        keep,
    )))
}
