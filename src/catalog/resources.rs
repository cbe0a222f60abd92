//! `ResourceType -> ArnRegex`: given an arn string, decide which
//! `AWS::<Service>::<Kind>` type label applies.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

lazy_static! {
    pub static ref RESOURCE_TYPES: HashMap<&'static str, Regex> = {
        let mut m = HashMap::new();
        m.insert("AWS::Account", Regex::new(r"^[0-9]{12}$").unwrap());
        m.insert("AWS::Iam::User", Regex::new(r"^arn:aws:iam::\d{12}:user/.+$").unwrap());
        m.insert("AWS::Iam::Role", Regex::new(r"^arn:aws:iam::\d{12}:role/.+$").unwrap());
        m.insert("AWS::Iam::Group", Regex::new(r"^arn:aws:iam::\d{12}:group/.+$").unwrap());
        m.insert("AWS::Iam::Policy", Regex::new(r"^arn:aws:iam::\d{12}:policy/.+$").unwrap());
        m.insert("AWS::Iam::InstanceProfile", Regex::new(r"^arn:aws:iam::\d{12}:instance-profile/.+$").unwrap());
        m.insert("AWS::Iam::SamlProvider", Regex::new(r"^arn:aws:iam::\d{12}:saml-provider/.+$").unwrap());
        m.insert("AWS::Ec2::Instance", Regex::new(r"^arn:aws:ec2:[^:]*:\d{12}:instance/.+$").unwrap());
        m.insert("AWS::Ec2::Volume", Regex::new(r"^arn:aws:ec2:[^:]*:\d{12}:volume/.+$").unwrap());
        m.insert("AWS::S3::Bucket", Regex::new(r"^arn:aws:s3:::[^/]+$").unwrap());
        m.insert("AWS::S3::Object", Regex::new(r"^arn:aws:s3:::[^/]+/.+$").unwrap());
        m
    };
}

/// Determine which resource-type label matches the given arn (or bare
/// account id), if any. Statement resolution uses this to classify
/// arns it has never seen as a graph node before.
pub fn type_of(arn: &str) -> Option<&'static str> {
    RESOURCE_TYPES.iter().find(|(_, regex)| regex.is_match(arn)).map(|(name, _)| *name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test_log::test]
    fn test_type_of_user() {
        assert_eq!(type_of("arn:aws:iam::123456789012:user/bob"), Some("AWS::Iam::User"));
    }

    #[test_log::test]
    fn test_type_of_account_root() {
        assert_eq!(type_of("123456789012"), Some("AWS::Account"));
    }

    #[test_log::test]
    fn test_type_of_unknown() {
        assert_eq!(type_of("not-an-arn"), None);
    }
}
