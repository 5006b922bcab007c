//! Contract expiry scanner.
//!
//! # Responsibility
//! - Read live contracts and yield candidate alerts for impending end dates.
//!
//! # Invariants
//! - `days_remaining = ceil((end - now) / 1 day)`; candidates satisfy
//!   `0 <= days_remaining <= lookahead_days`.
//! - Output is sorted by `days_remaining`, then contract id, so identical
//!   inputs yield identical candidate lists.
//! - A malformed contract is skipped and logged; it never aborts the scan.

use crate::clock::{ceil_days, Clock};
use crate::config::EngineConfig;
use crate::model::notification::{CandidateAlert, NotificationKind, UNKNOWN_COMPANY};
use crate::model::snapshot::RecordPayload;
use crate::repo::record_repo::{RecordResult, RecordStore};
use chrono::{DateTime, NaiveDate};
use log::{info, warn};
use serde_json::Value;

const STATUS_FIELD: &str = "status";
const END_DATE_FIELD: &str = "end_date";
const CONTRACT_NUMBER_FIELD: &str = "contract_number";
const COMPANY_ID_FIELD: &str = "company_id";
const COMPANY_NAME_FIELD: &str = "name";

/// Scans the contracts collection for upcoming expiries.
pub struct AlertScanner<S: RecordStore, C: Clock> {
    store: S,
    clock: C,
    config: EngineConfig,
}

impl<S: RecordStore, C: Clock> AlertScanner<S, C> {
    pub fn new(store: S, clock: C, config: EngineConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    /// Returns candidates for active contracts ending within `lookahead_days`.
    ///
    /// Contracts whose payload is not a JSON object are skipped.
    ///
    /// # Errors
    /// - Returns the record store error when the contracts collection cannot
    ///   be read at all.
    pub fn scan(&self, lookahead_days: u32) -> RecordResult<Vec<CandidateAlert>> {
        let now_ms = self.clock.now_ms();
        let contracts = self
            .store
            .list_raw_records(&self.config.contracts_collection)?;
        let total = contracts.len();

        let mut candidates = Vec::new();
        for contract in contracts {
            let payload = match contract.parse() {
                Ok(payload) => payload,
                Err(err) => {
                    warn!(
                        "event=alert_scan_skip module=alert_scanner status=error contract_id={} reason=invalid_payload error={}",
                        contract.record_id, err
                    );
                    continue;
                }
            };
            if let Some(candidate) =
                self.evaluate(&contract.record_id, &payload, now_ms, lookahead_days)
            {
                candidates.push(candidate);
            }
        }
        candidates.sort_by(|left, right| {
            left.days_remaining
                .cmp(&right.days_remaining)
                .then_with(|| left.source_id.cmp(&right.source_id))
        });

        info!(
            "event=alert_scan module=alert_scanner status=ok contracts={} candidates={} lookahead_days={}",
            total,
            candidates.len(),
            lookahead_days
        );
        Ok(candidates)
    }

    fn evaluate(
        &self,
        contract_id: &str,
        payload: &RecordPayload,
        now_ms: i64,
        lookahead_days: u32,
    ) -> Option<CandidateAlert> {
        let status = payload.get(STATUS_FIELD).and_then(Value::as_str)?;
        if !self.config.is_active_status(status) {
            return None;
        }

        let Some(end_at) = payload.get(END_DATE_FIELD).and_then(parse_end_at) else {
            warn!(
                "event=alert_scan_skip module=alert_scanner status=error contract_id={} reason=invalid_end_date",
                contract_id
            );
            return None;
        };

        let Some(days_remaining) = ceil_days(now_ms, end_at) else {
            warn!(
                "event=alert_scan_skip module=alert_scanner status=error contract_id={} reason=end_date_out_of_range",
                contract_id
            );
            return None;
        };
        if days_remaining < 0 || days_remaining > i64::from(lookahead_days) {
            return None;
        }

        let contract_number = payload
            .get(CONTRACT_NUMBER_FIELD)
            .and_then(value_as_text)
            .unwrap_or_else(|| contract_id.to_string());

        Some(CandidateAlert {
            kind: NotificationKind::ContractExpiring,
            source_id: contract_id.to_string(),
            contract_number,
            company_name: self.company_name(contract_id, payload),
            end_at,
            days_remaining,
            scanned_at: now_ms,
        })
    }

    fn company_name(&self, contract_id: &str, payload: &RecordPayload) -> String {
        let Some(company_id) = payload.get(COMPANY_ID_FIELD).and_then(value_as_text) else {
            return UNKNOWN_COMPANY.to_string();
        };

        match self
            .store
            .get_record(&self.config.companies_collection, &company_id)
        {
            Ok(Some(company)) => company
                .get(COMPANY_NAME_FIELD)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map_or_else(|| UNKNOWN_COMPANY.to_string(), str::to_string),
            Ok(None) => UNKNOWN_COMPANY.to_string(),
            Err(err) => {
                warn!(
                    "event=alert_scan_company module=alert_scanner status=error contract_id={} company_id={} error={}",
                    contract_id, company_id, err
                );
                UNKNOWN_COMPANY.to_string()
            }
        }
    }
}

/// Parses an end date as epoch milliseconds.
///
/// Accepts `YYYY-MM-DD` (midnight UTC), RFC 3339 timestamps and integer
/// epoch milliseconds.
pub fn parse_end_at(value: &Value) -> Option<i64> {
    match value {
        Value::String(text) => {
            let text = text.trim();
            if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
                return date
                    .and_hms_opt(0, 0, 0)
                    .map(|midnight| midnight.and_utc().timestamp_millis());
            }
            DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|instant| instant.timestamp_millis())
        }
        Value::Number(number) => number.as_i64(),
        _ => None,
    }
}

fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}
