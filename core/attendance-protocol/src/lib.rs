//! Wire types and validation for the attendance remote service API.
//!
//! Shared by the HTTP gateway and any test servers so the JSON shapes cannot
//! drift. The remote service is the authority; clients validate what they
//! receive before it reaches local state.
//!
//! Every response is wrapped in an envelope:
//!
//! ```json
//! { "ok": true, "data": { ... } }
//! { "ok": false, "error": { "code": "leave_conflict", "message": "...", "current_status": "approved" } }
//! ```

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const API_VERSION: u32 = 1;
pub const MAX_RESPONSE_BYTES: usize = 1024 * 1024; // 1MB
pub const MAX_ID_LEN: usize = 128;

/// Longest span a single session may report.
const MAX_SESSION_HOURS: i64 = 24;

#[derive(Debug, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
    /// Present on `leave_conflict` errors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_status: Option<WireLeaveStatus>,
}

impl ErrorInfo {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            current_status: None,
        }
    }

    pub fn conflict(current: WireLeaveStatus) -> Self {
        Self {
            code: "leave_conflict".to_string(),
            message: format!("leave request is already {}", current.as_str()),
            current_status: Some(current),
        }
    }
}

impl Response {
    pub fn ok(data: Value) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::error_with_info(ErrorInfo::new(code, message))
    }

    pub fn error_with_info(error: ErrorInfo) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(error),
        }
    }

    /// Unwraps the envelope. An `ok` response without data yields `null`.
    pub fn into_result(self) -> Result<Value, ErrorInfo> {
        if self.ok {
            return Ok(self.data.unwrap_or(Value::Null));
        }
        Err(self
            .error
            .unwrap_or_else(|| ErrorInfo::new("unknown_error", "request failed without details")))
    }
}

pub fn parse_response(bytes: &[u8]) -> Result<Response, ErrorInfo> {
    if bytes.len() > MAX_RESPONSE_BYTES {
        return Err(ErrorInfo::new(
            "response_too_large",
            format!("response exceeds {} bytes", MAX_RESPONSE_BYTES),
        ));
    }
    serde_json::from_slice(bytes).map_err(|err| {
        ErrorInfo::new(
            "invalid_envelope",
            format!("response is not a valid envelope: {}", err),
        )
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Enumerations
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireDayStatus {
    Present,
    Absent,
    Late,
    HalfDay,
    WeeklyOff,
    Leave,
    InProgress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireLeaveStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl WireLeaveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WireLeaveStatus::Pending => "pending",
            WireLeaveStatus::Approved => "approved",
            WireLeaveStatus::Rejected => "rejected",
            WireLeaveStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireOverallStatus {
    Present,
    Absent,
    Mixed,
}

// ─────────────────────────────────────────────────────────────────────────────
// Payloads
// ─────────────────────────────────────────────────────────────────────────────

/// Session status. Times stay strings: the service sends either RFC 3339
/// timestamps or bare clock times, and clients bind the latter to a date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusPayload {
    pub is_checked_in: bool,
    #[serde(default)]
    pub is_on_break: bool,
    #[serde(default)]
    pub check_in_time: Option<String>,
    #[serde(default)]
    pub check_out_time: Option<String>,
    #[serde(default)]
    pub break_start_time: Option<String>,
    #[serde(default)]
    pub break_end_time: Option<String>,
    #[serde(default)]
    pub total_hours: Decimal,
    #[serde(default)]
    pub break_time: Decimal,
    #[serde(default)]
    pub last_check_in_date: Option<NaiveDate>,
}

impl StatusPayload {
    pub fn validate(&self) -> Result<(), ErrorInfo> {
        if self.is_on_break && !self.is_checked_in {
            return Err(ErrorInfo::new(
                "inconsistent_status",
                "is_on_break requires is_checked_in",
            ));
        }
        if self.is_checked_in && self.check_out_time.is_some() {
            return Err(ErrorInfo::new(
                "inconsistent_status",
                "check_out_time set while checked in",
            ));
        }
        require_hours(self.total_hours, "total_hours")?;
        require_hours(self.break_time, "break_time")?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordPayload {
    pub actor_id: String,
    pub date: NaiveDate,
    pub status: WireDayStatus,
    #[serde(default)]
    pub check_in_time: Option<String>,
    #[serde(default)]
    pub check_out_time: Option<String>,
    #[serde(default)]
    pub break_start_time: Option<String>,
    #[serde(default)]
    pub break_end_time: Option<String>,
    #[serde(default)]
    pub total_hours: Decimal,
    #[serde(default)]
    pub break_time: Decimal,
    #[serde(default)]
    pub finalized: bool,
}

impl RecordPayload {
    pub fn validate(&self) -> Result<(), ErrorInfo> {
        require_id(&self.actor_id, "actor_id")?;
        require_hours(self.total_hours, "total_hours")?;
        require_hours(self.break_time, "break_time")?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklySummaryPayload {
    pub actor_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days_present: u32,
    pub days_absent: u32,
    #[serde(default)]
    pub days_half_day: u32,
    #[serde(default)]
    pub days_late: u32,
    #[serde(default)]
    pub days_leave: u32,
    #[serde(default)]
    pub days_weekly_off: u32,
    #[serde(default)]
    pub total_hours: Decimal,
    #[serde(default)]
    pub total_break_time: Decimal,
    pub overall_status: WireOverallStatus,
}

impl WeeklySummaryPayload {
    /// Structural checks only; day-count plausibility is judged by the client.
    pub fn validate(&self) -> Result<(), ErrorInfo> {
        require_id(&self.actor_id, "actor_id")?;
        if self.end_date < self.start_date {
            return Err(ErrorInfo::new(
                "invalid_range",
                "end_date must not precede start_date",
            ));
        }
        if self.total_hours < Decimal::ZERO || self.total_break_time < Decimal::ZERO {
            return Err(ErrorInfo::new("invalid_hours", "totals must be non-negative"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LeaveDecisionRequest {
    pub status: WireLeaveStatus,
    pub actor_id: String,
    pub actor_name: String,
}

impl LeaveDecisionRequest {
    pub fn validate(&self) -> Result<(), ErrorInfo> {
        if self.status == WireLeaveStatus::Pending {
            return Err(ErrorInfo::new(
                "invalid_status",
                "a decision must move the request out of pending",
            ));
        }
        require_id(&self.actor_id, "actor_id")?;
        if self.actor_name.trim().is_empty() {
            return Err(ErrorInfo::new("missing_field", "actor_name is required"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveDecisionPayload {
    pub leave_id: String,
    pub status: WireLeaveStatus,
}

// ─────────────────────────────────────────────────────────────────────────────
// Parsing
// ─────────────────────────────────────────────────────────────────────────────

pub fn parse_status(data: Value) -> Result<StatusPayload, ErrorInfo> {
    let status: StatusPayload = parse_data(data, "status")?;
    status.validate()?;
    Ok(status)
}

/// Parses an optional status; `null` means the service sent none.
pub fn parse_optional_status(data: Value) -> Result<Option<StatusPayload>, ErrorInfo> {
    if data.is_null() {
        return Ok(None);
    }
    parse_status(data).map(Some)
}

pub fn parse_record(data: Value) -> Result<Option<RecordPayload>, ErrorInfo> {
    if data.is_null() {
        return Ok(None);
    }
    let record: RecordPayload = parse_data(data, "record")?;
    record.validate()?;
    Ok(Some(record))
}

pub fn parse_records(data: Value) -> Result<Vec<RecordPayload>, ErrorInfo> {
    let records: Vec<RecordPayload> = parse_data(data, "records")?;
    for record in &records {
        record.validate()?;
    }
    Ok(records)
}

pub fn parse_summaries(data: Value) -> Result<Vec<WeeklySummaryPayload>, ErrorInfo> {
    let summaries: Vec<WeeklySummaryPayload> = parse_data(data, "summaries")?;
    for summary in &summaries {
        summary.validate()?;
    }
    Ok(summaries)
}

pub fn parse_leave_decision(data: Value) -> Result<LeaveDecisionPayload, ErrorInfo> {
    let decision: LeaveDecisionPayload = parse_data(data, "leave decision")?;
    require_id(&decision.leave_id, "leave_id")?;
    Ok(decision)
}

fn parse_data<T: DeserializeOwned>(data: Value, what: &str) -> Result<T, ErrorInfo> {
    serde_json::from_value(data).map_err(|err| {
        ErrorInfo::new(
            "invalid_payload",
            format!("{} payload is invalid: {}", what, err),
        )
    })
}

fn require_id(value: &str, field: &str) -> Result<(), ErrorInfo> {
    if value.trim().is_empty() {
        return Err(ErrorInfo::new(
            "missing_field",
            format!("{} is required", field),
        ));
    }
    if value.len() > MAX_ID_LEN {
        return Err(ErrorInfo::new(
            "invalid_id",
            format!("{} must be {} characters or fewer", field, MAX_ID_LEN),
        ));
    }
    Ok(())
}

fn require_hours(value: Decimal, field: &str) -> Result<(), ErrorInfo> {
    if value < Decimal::ZERO || value > Decimal::from(MAX_SESSION_HOURS) {
        return Err(ErrorInfo::new(
            "invalid_hours",
            format!("{} must be between 0 and {}", field, MAX_SESSION_HOURS),
        ));
    }
    Ok(())
}
