//! Small helper macros shared across modules, in the same shape the policy
//! document types use: Display-as-pretty-JSON and FromStr-as-JSON.

/// Implement `Display` for a type by formatting it as pretty-printed JSON.
#[macro_export]
macro_rules! display_json {
    ($cls:ident) => {
        impl std::fmt::Display for $cls {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                let buf = Vec::new();
                let serde_formatter = ::serde_json::ser::PrettyFormatter::with_indent(b"    ");
                let mut ser = ::serde_json::Serializer::with_formatter(buf, serde_formatter);
                match serde::Serialize::serialize(self, &mut ser) {
                    Ok(()) => (),
                    Err(e) => {
                        ::log::error!("failed to serialize {}: {}", stringify!($cls), e);
                        return Err(::std::fmt::Error {});
                    }
                };
                match std::str::from_utf8(&ser.into_inner()) {
                    Ok(s) => write!(f, "{}", s),
                    Err(e) => {
                        ::log::error!("JSON serialization of {} was not UTF-8: {}", stringify!($cls), e);
                        Err(::std::fmt::Error {})
                    }
                }
            }
        }
    };
}

/// Implement `FromStr` for a type by parsing it as JSON.
#[macro_export]
macro_rules! from_str_json {
    ($cls:ident) => {
        impl ::std::str::FromStr for $cls {
            type Err = ::serde_json::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match ::serde_json::from_str::<Self>(s) {
                    Ok(result) => Ok(result),
                    Err(e) => {
                        ::log::debug!("failed to parse {}: {:?}", stringify!($cls), e);
                        Err(e)
                    }
                }
            }
        }
    };
}
