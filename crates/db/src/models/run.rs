use chrono::{DateTime, TimeZone, Utc};
use testpilot_core::{Run, RunStatus};
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RunRow {
    pub id: String,
    pub url: String,
    pub status: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl RunRow {
    pub fn into_domain(self) -> Run {
        Run {
            id: Uuid::parse_str(&self.id).unwrap_or_default(),
            url: self.url,
            status: RunStatus::parse(&self.status).unwrap_or_default(),
            created_at: timestamp_to_datetime(self.created_at),
            updated_at: timestamp_to_datetime(self.updated_at),
        }
    }
}

impl From<&Run> for RunRow {
    fn from(run: &Run) -> Self {
        Self {
            id: run.id.to_string(),
            url: run.url.clone(),
            status: run.status.as_str().to_string(),
            created_at: datetime_to_timestamp(run.created_at),
            updated_at: datetime_to_timestamp(run.updated_at),
        }
    }
}

pub(crate) fn timestamp_to_datetime(ts: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(ts, 0).unwrap()
}

pub(crate) fn datetime_to_timestamp(dt: DateTime<Utc>) -> i64 {
    dt.timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_roundtrip() {
        let run = Run::new("https://example.test");
        let row = RunRow::from(&run);
        let back = row.into_domain();

        assert_eq!(back.id, run.id);
        assert_eq!(back.url, run.url);
        assert_eq!(back.status, run.status);
    }
}
