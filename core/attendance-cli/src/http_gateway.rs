//! HTTP implementation of [`RemoteGateway`] on top of `reqwest`.
//!
//! Transport failures, timeouts and 5xx answers surface as
//! [`GatewayError::Unavailable`] so the core queues and retries. Envelopes
//! that decode but fail validation are [`GatewayError::Malformed`] and never
//! reach local state.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use attendance_core::time_math::parse_timestamp;
use attendance_core::{
    ActorMeta, AttendanceRecord, AttendanceStatus, Clock, DateRange, DayStatus, GatewayError,
    GatewayResult, LeaveStatus, OverallStatus, RemoteGateway, SummarySource, SystemClock,
    WeeklySummary,
};
use attendance_protocol::{
    parse_leave_decision, parse_optional_status, parse_record, parse_records, parse_response,
    parse_status, parse_summaries, ErrorInfo, LeaveDecisionRequest, RecordPayload, StatusPayload,
    WeeklySummaryPayload, WireDayStatus, WireLeaveStatus, WireOverallStatus, API_VERSION,
};
use chrono::{Duration as ChronoDuration, NaiveDate, NaiveDateTime};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde_json::Value;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const API_VERSION_HEADER: &str = "x-api-version";
/// Longest error body echoed into a rejection reason.
const MAX_REASON_LEN: usize = 200;

pub struct HttpGateway {
    client: Client,
    base_url: String,
    clock: Arc<dyn Clock>,
}

impl HttpGateway {
    pub fn new(base_url: &str) -> GatewayResult<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|err| GatewayError::Unavailable(format!("http client: {}", err)))?;
        Ok(HttpGateway {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            clock: Arc::new(SystemClock),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, self.url(path))
            .header(API_VERSION_HEADER, API_VERSION.to_string())
    }

    async fn call(&self, request: RequestBuilder) -> GatewayResult<Value> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(transport_error)?;
        debug!(status = status.as_u16(), bytes = body.len(), "Remote response");
        interpret(status, &body)
    }

    async fn session_call(
        &self,
        actor_id: &str,
        action: &str,
    ) -> GatewayResult<Option<AttendanceStatus>> {
        let path = format!("/attendance/{}/{}", actor_id, action);
        let data = self.call(self.request(Method::POST, &path)).await?;
        let today = self.clock.now_local().date();
        parse_optional_status(data)
            .map(|status| status.map(|s| status_from_wire(&s, today)))
            .map_err(malformed)
    }
}

#[async_trait]
impl RemoteGateway for HttpGateway {
    async fn get_status(&self, actor_id: &str) -> GatewayResult<AttendanceStatus> {
        let path = format!("/attendance/{}/status", actor_id);
        let data = self.call(self.request(Method::GET, &path)).await?;
        let payload = parse_status(data).map_err(malformed)?;
        Ok(status_from_wire(&payload, self.clock.now_local().date()))
    }

    async fn check_in(&self, actor_id: &str) -> GatewayResult<Option<AttendanceStatus>> {
        self.session_call(actor_id, "check-in").await
    }

    async fn break_in(&self, actor_id: &str) -> GatewayResult<Option<AttendanceStatus>> {
        self.session_call(actor_id, "break-in").await
    }

    async fn break_out(&self, actor_id: &str) -> GatewayResult<Option<AttendanceStatus>> {
        self.session_call(actor_id, "break-out").await
    }

    async fn check_out(&self, actor_id: &str) -> GatewayResult<Option<AttendanceStatus>> {
        self.session_call(actor_id, "check-out").await
    }

    async fn get_history(
        &self,
        actor_id: &str,
        range: DateRange,
    ) -> GatewayResult<Vec<AttendanceRecord>> {
        let path = format!("/attendance/{}/history", actor_id);
        let request = self
            .request(Method::GET, &path)
            .query(&[("start", range.start.to_string()), ("end", range.end.to_string())]);
        let data = self.call(request).await?;
        let records = parse_records(data).map_err(malformed)?;
        Ok(records.iter().map(record_from_wire).collect())
    }

    async fn get_day(
        &self,
        actor_id: &str,
        date: NaiveDate,
    ) -> GatewayResult<Option<AttendanceRecord>> {
        let path = format!("/attendance/{}/days/{}", actor_id, date);
        let data = self.call(self.request(Method::GET, &path)).await?;
        let record = parse_record(data).map_err(malformed)?;
        Ok(record.as_ref().map(record_from_wire))
    }

    async fn get_weekly_summary(&self, range: DateRange) -> GatewayResult<Vec<WeeklySummary>> {
        let request = self
            .request(Method::GET, "/attendance/summary")
            .query(&[("start", range.start.to_string()), ("end", range.end.to_string())]);
        let data = self.call(request).await?;
        let summaries = parse_summaries(data).map_err(malformed)?;
        Ok(summaries.iter().map(summary_from_wire).collect())
    }

    async fn set_leave_status(
        &self,
        leave_id: &str,
        status: LeaveStatus,
        actor: &ActorMeta,
    ) -> GatewayResult<LeaveStatus> {
        let body = LeaveDecisionRequest {
            status: leave_to_wire(status),
            actor_id: actor.actor_id.clone(),
            actor_name: actor.actor_name.clone(),
        };
        body.validate()
            .map_err(|info| GatewayError::Rejected {
                status: None,
                reason: info.message,
            })?;

        let path = format!("/leaves/{}/status", leave_id);
        let data = self
            .call(self.request(Method::PUT, &path).json(&body))
            .await?;
        let decision = parse_leave_decision(data).map_err(malformed)?;
        if decision.leave_id != leave_id {
            return Err(GatewayError::Malformed(format!(
                "decision for {} returned for {}",
                decision.leave_id, leave_id
            )));
        }
        Ok(leave_from_wire(decision.status))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Response classification
// ─────────────────────────────────────────────────────────────────────────────

fn transport_error(err: reqwest::Error) -> GatewayError {
    GatewayError::Unavailable(err.to_string())
}

fn malformed(info: ErrorInfo) -> GatewayError {
    GatewayError::Malformed(format!("{}: {}", info.code, info.message))
}

/// Maps an HTTP answer to the envelope's data or a gateway error.
fn interpret(status: StatusCode, body: &[u8]) -> GatewayResult<Value> {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        return Err(GatewayError::Unavailable(format!(
            "service answered {}",
            status.as_u16()
        )));
    }

    let envelope = match parse_response(body) {
        Ok(envelope) => envelope,
        Err(info) if status.is_success() => return Err(malformed(info)),
        Err(_) => {
            return Err(GatewayError::Rejected {
                status: Some(status.as_u16()),
                reason: truncate_reason(&String::from_utf8_lossy(body)),
            })
        }
    };

    match envelope.into_result() {
        Ok(data) if status.is_success() => Ok(data),
        Ok(_) => Err(GatewayError::Rejected {
            status: Some(status.as_u16()),
            reason: format!("unexpected status {}", status.as_u16()),
        }),
        Err(info) => Err(error_from_info(status, info)),
    }
}

fn error_from_info(status: StatusCode, info: ErrorInfo) -> GatewayError {
    if let Some(current) = info.current_status {
        return GatewayError::Conflict {
            current: leave_from_wire(current),
        };
    }
    GatewayError::Rejected {
        status: Some(status.as_u16()),
        reason: format!("{}: {}", info.code, truncate_reason(&info.message)),
    }
}

fn truncate_reason(reason: &str) -> String {
    let trimmed = reason.trim();
    if trimmed.chars().count() <= MAX_REASON_LEN {
        return trimmed.to_string();
    }
    let mut cut: String = trimmed.chars().take(MAX_REASON_LEN).collect();
    cut.push('…');
    cut
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire conversion
// ─────────────────────────────────────────────────────────────────────────────

/// Parses an optional timestamp; bare clock times bind to `date`.
fn bind(raw: Option<&str>, date: NaiveDate) -> Option<NaiveDateTime> {
    raw.and_then(|value| parse_timestamp(value, date))
}

/// Like [`bind`], but a bare time earlier than `after` rolls to the next day.
fn bind_after(
    raw: Option<&str>,
    date: NaiveDate,
    after: Option<NaiveDateTime>,
) -> Option<NaiveDateTime> {
    let time = bind(raw, date)?;
    match after {
        Some(start) if time < start => Some(time + ChronoDuration::days(1)),
        _ => Some(time),
    }
}

fn status_from_wire(payload: &StatusPayload, today: NaiveDate) -> AttendanceStatus {
    let date = payload.last_check_in_date.unwrap_or(today);
    let check_in_time = bind(payload.check_in_time.as_deref(), date);
    let break_start_time = bind_after(payload.break_start_time.as_deref(), date, check_in_time);
    AttendanceStatus {
        is_checked_in: payload.is_checked_in,
        is_on_break: payload.is_on_break,
        check_in_time,
        check_out_time: bind_after(payload.check_out_time.as_deref(), date, check_in_time),
        break_start_time,
        break_end_time: bind_after(payload.break_end_time.as_deref(), date, break_start_time),
        total_hours: payload.total_hours,
        break_time: payload.break_time,
        last_check_in_date: payload
            .last_check_in_date
            .or_else(|| check_in_time.map(|t| t.date())),
    }
}

fn record_from_wire(payload: &RecordPayload) -> AttendanceRecord {
    let date = payload.date;
    let check_in_time = bind(payload.check_in_time.as_deref(), date);
    let break_start_time = bind_after(payload.break_start_time.as_deref(), date, check_in_time);
    AttendanceRecord {
        actor_id: payload.actor_id.clone(),
        date,
        status: day_from_wire(payload.status),
        check_in_time,
        check_out_time: bind_after(payload.check_out_time.as_deref(), date, check_in_time),
        break_start_time,
        break_end_time: bind_after(payload.break_end_time.as_deref(), date, break_start_time),
        total_hours: payload.total_hours,
        break_time: payload.break_time,
        finalized: payload.finalized,
    }
}

fn summary_from_wire(payload: &WeeklySummaryPayload) -> WeeklySummary {
    WeeklySummary {
        actor_id: payload.actor_id.clone(),
        range: DateRange::new(payload.start_date, payload.end_date),
        days_present: payload.days_present,
        days_absent: payload.days_absent,
        days_half_day: payload.days_half_day,
        days_late: payload.days_late,
        days_leave: payload.days_leave,
        days_weekly_off: payload.days_weekly_off,
        total_hours: payload.total_hours,
        total_break_time: payload.total_break_time,
        overall_status: match payload.overall_status {
            WireOverallStatus::Present => OverallStatus::Present,
            WireOverallStatus::Absent => OverallStatus::Absent,
            WireOverallStatus::Mixed => OverallStatus::Mixed,
        },
        source: SummarySource::Remote,
    }
}

fn day_from_wire(status: WireDayStatus) -> DayStatus {
    match status {
        WireDayStatus::Present => DayStatus::Present,
        WireDayStatus::Absent => DayStatus::Absent,
        WireDayStatus::Late => DayStatus::Late,
        WireDayStatus::HalfDay => DayStatus::HalfDay,
        WireDayStatus::WeeklyOff => DayStatus::WeeklyOff,
        WireDayStatus::Leave => DayStatus::Leave,
        WireDayStatus::InProgress => DayStatus::InProgress,
    }
}

fn leave_from_wire(status: WireLeaveStatus) -> LeaveStatus {
    match status {
        WireLeaveStatus::Pending => LeaveStatus::Pending,
        WireLeaveStatus::Approved => LeaveStatus::Approved,
        WireLeaveStatus::Rejected => LeaveStatus::Rejected,
        WireLeaveStatus::Cancelled => LeaveStatus::Cancelled,
    }
}

fn leave_to_wire(status: LeaveStatus) -> WireLeaveStatus {
    match status {
        LeaveStatus::Pending => WireLeaveStatus::Pending,
        LeaveStatus::Approved => WireLeaveStatus::Approved,
        LeaveStatus::Rejected => WireLeaveStatus::Rejected,
        LeaveStatus::Cancelled => WireLeaveStatus::Cancelled,
    }
}
