//! Human-readable request summaries for `lims show`.

use anyhow::Result;
use minijinja::{Environment, context};
use serde::Serialize;

use super::config::LabConfig;
use crate::core::types::{CompletionState, Request};

const REQUEST_SUMMARY_TEMPLATE: &str = include_str!("templates/request_summary.txt");

#[derive(Debug, Serialize)]
struct LineContext<'a> {
    code: &'a str,
    name: &'a str,
    completion: &'static str,
    result: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct BillingContext {
    billed: String,
    discount: String,
    net: String,
    paid: String,
    due: String,
}

/// Render the text summary of one request.
pub fn render_request_summary(config: &LabConfig, request: &Request) -> Result<String> {
    let mut env = Environment::new();
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);
    env.add_template("request_summary", REQUEST_SUMMARY_TEMPLATE)?;

    let analyses: Vec<LineContext<'_>> = request
        .analyses
        .iter()
        .map(|line| LineContext {
            code: &line.code,
            name: &line.name,
            completion: line.completion.as_str(),
            result: line.result.as_deref().filter(|_| line.is_entered()),
        })
        .collect();
    let complete = request
        .analyses
        .iter()
        .filter(|line| line.completion == CompletionState::Complete)
        .count();
    let billing = &request.billing;
    let billing = BillingContext {
        billed: billing.billed.to_string(),
        discount: billing.discount.to_string(),
        net: billing.net_total().to_string(),
        paid: billing.paid.to_string(),
        due: billing.due.to_string(),
    };

    let template = env.get_template("request_summary")?;
    let rendered = template.render(context! {
        lab_name => &config.lab_name,
        currency => &config.currency,
        id => &request.id,
        status => request.status.as_str(),
        version => request.version,
        patient_id => &request.patient_id,
        patient_name => &request.patient_name,
        created_at => &request.created_at,
        updated_at => &request.updated_at,
        analyses => analyses,
        complete => complete,
        billing => billing,
    })?;
    Ok(rendered)
}
