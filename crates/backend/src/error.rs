use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum BackendError {
    #[snafu(display("backend id '{raw}' is invalid for {id_type}"))]
    InvalidId {
        stage: &'static str,
        id_type: &'static str,
        raw: String,
        source: uuid::Error,
    },
    #[snafu(display("failed to build backend http client"))]
    BuildHttpClient {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("backend request failed at {stage}: {source}"))]
    RequestFailed {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("backend returned status {status} at {stage}: {body}"))]
    UnexpectedStatus {
        stage: &'static str,
        status: u16,
        body: String,
    },
    #[snafu(display("failed to decode backend payload at {stage}: {source}"))]
    DecodePayload {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("backend insert into '{entity}' returned no rows"))]
    EmptyInsertReturn {
        stage: &'static str,
        entity: &'static str,
    },
    #[snafu(display("backend timestamp '{raw}' is not RFC 3339"))]
    InvalidTimestamp {
        stage: &'static str,
        raw: String,
        source: chrono::ParseError,
    },
    #[snafu(display("backend row role '{raw}' is not a known message role"))]
    InvalidRole { stage: &'static str, raw: String },
}

pub type BackendResult<T> = Result<T, BackendError>;
