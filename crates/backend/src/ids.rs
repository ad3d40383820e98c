use std::fmt;
use std::str::FromStr;

use snafu::ResultExt;
use uuid::Uuid;

use super::error::{BackendError, BackendResult, InvalidIdSnafu};

// Macro keeps both row ID wrappers structurally identical. Row ids are minted
// by the hosted service; `mint` exists for local construction in tests.
macro_rules! define_row_id {
    ($name:ident, $id_type:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new(raw: Uuid) -> Self {
                Self(raw)
            }

            pub fn mint() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn parse(raw: &str) -> BackendResult<Self> {
                let parsed = Uuid::parse_str(raw).context(InvalidIdSnafu {
                    stage: "parse-row-id",
                    id_type: $id_type,
                    raw: raw.to_string(),
                })?;
                Ok(Self(parsed))
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(formatter, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self::new(value)
            }
        }

        impl From<$name> for Uuid {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl FromStr for $name {
            type Err = BackendError;

            fn from_str(raw: &str) -> BackendResult<Self> {
                Self::parse(raw)
            }
        }
    };
}

define_row_id!(ConversationId, "conversation-id");
define_row_id!(MessageId, "message-id");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_display() {
        let id = ConversationId::mint();
        let parsed = ConversationId::parse(&id.to_string()).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn parse_rejects_garbage() {
        let error = MessageId::parse("not-a-uuid").unwrap_err();
        assert!(matches!(error, BackendError::InvalidId { .. }));
    }
}
