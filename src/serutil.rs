//! Serde helpers for policy-document fields that may be encoded as either a
//! single JSON value or a list of values (`Action`, `Resource`, `Principal.AWS`,
//! condition string lists, ...): a `Single`/`List` enum with a `to_vec()`
//! escape hatch, rather than a `Vec<T>` with a custom visitor per field.

use serde::{
    de::{value::SeqAccessDeserializer, Deserializer, SeqAccess, Visitor},
    Deserialize, Serialize,
};
use std::fmt::{Formatter, Result as FmtResult};
use std::marker::PhantomData;

/// A JSON value that may appear either bare or wrapped in an array.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn to_vec(&self) -> Vec<&T> {
        match self {
            Self::One(item) => vec![item],
            Self::Many(items) => items.iter().collect(),
        }
    }

    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::One(item) => vec![item],
            Self::Many(items) => items,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::One(_) => 1,
            Self::Many(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<'de, T> Deserialize<'de> for OneOrMany<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct OneOrManyVisitor<T>(PhantomData<T>);

        impl<'de, T> Visitor<'de> for OneOrManyVisitor<T>
        where
            T: Deserialize<'de>,
        {
            type Value = OneOrMany<T>;

            fn expecting(&self, f: &mut Formatter) -> FmtResult {
                write!(f, "a value or a list of values")
            }

            fn visit_seq<A>(self, access: A) -> Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let items = Vec::<T>::deserialize(SeqAccessDeserializer::new(access))?;
                Ok(OneOrMany::Many(items))
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                let value = T::deserialize(serde::de::value::StrDeserializer::new(v))?;
                Ok(OneOrMany::One(value))
            }

            fn visit_map<A>(self, access: A) -> Result<Self::Value, A::Error>
            where
                A: serde::de::MapAccess<'de>,
            {
                let value = T::deserialize(serde::de::value::MapAccessDeserializer::new(access))?;
                Ok(OneOrMany::One(value))
            }
        }

        deserializer.deserialize_any(OneOrManyVisitor(PhantomData))
    }
}

impl<T> From<T> for OneOrMany<T> {
    fn from(value: T) -> Self {
        Self::One(value)
    }
}

impl<T> From<Vec<T>> for OneOrMany<T> {
    fn from(values: Vec<T>) -> Self {
        Self::Many(values)
    }
}
