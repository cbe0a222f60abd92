//! `ActionName -> {Access, Description, Reference, Affects}`.
//!
//! A production deployment would generate this table from the AWS IAM
//! Actions/Resources/Condition-keys reference the same way
//! `iam-policy-autopilot-policy-generation`'s `build.rs` embeds generated SDK
//! metadata; this crate ships a static table covering every action the
//! attack templates in [`crate::templates`] reference, plus a representative
//! spread of other IAM/EC2/S3 actions so glob expansion and `NotAction`
//! complementation have real surface area to exercise.

use lazy_static::lazy_static;
use std::collections::HashMap;

/// Whether an action is read-only or may mutate state, mirroring the
/// `Access` column AWS publishes for each IAM action.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Access {
    Read,
    Write,
    ListOnly,
    PermissionsManagement,
    Tagging,
}

impl Access {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "Read",
            Self::Write => "Write",
            Self::ListOnly => "List",
            Self::PermissionsManagement => "Permissions management",
            Self::Tagging => "Tagging",
        }
    }
}

/// Catalog entry for a single fully-qualified action name (`service:Verb`).
#[derive(Clone, Debug)]
pub struct ActionDef {
    pub access: Access,
    pub description: &'static str,
    pub reference: &'static str,
    /// Resource types this action can act upon, in catalog order.
    pub affects: &'static [&'static str],
}

macro_rules! action {
    ($access:ident, $description:literal, $reference:literal, [$($affects:literal),* $(,)?]) => {
        ActionDef { access: Access::$access, description: $description, reference: $reference, affects: &[$($affects),*] }
    };
}

lazy_static! {
    pub static ref ACTIONS: HashMap<&'static str, ActionDef> = {
        let mut m = HashMap::new();

        m.insert("iam:CreatePolicyVersion", action!(
            Write,
            "Grants permission to create a new version of the specified managed policy",
            "https://docs.aws.amazon.com/IAM/latest/APIReference/API_CreatePolicyVersion.html",
            ["AWS::Iam::Policy"]
        ));
        m.insert("iam:AttachGroupPolicy", action!(
            PermissionsManagement, "Grants permission to attach a managed policy to a group",
            "https://docs.aws.amazon.com/IAM/latest/APIReference/API_AttachGroupPolicy.html",
            ["AWS::Iam::Group"]
        ));
        m.insert("iam:AttachRolePolicy", action!(
            PermissionsManagement, "Grants permission to attach a managed policy to a role",
            "https://docs.aws.amazon.com/IAM/latest/APIReference/API_AttachRolePolicy.html",
            ["AWS::Iam::Role"]
        ));
        m.insert("iam:AttachUserPolicy", action!(
            PermissionsManagement, "Grants permission to attach a managed policy to a user",
            "https://docs.aws.amazon.com/IAM/latest/APIReference/API_AttachUserPolicy.html",
            ["AWS::Iam::User"]
        ));
        m.insert("iam:AddUserToGroup", action!(
            Write, "Grants permission to add a user to a group",
            "https://docs.aws.amazon.com/IAM/latest/APIReference/API_AddUserToGroup.html",
            ["AWS::Iam::Group"]
        ));
        m.insert("iam:AddRoleToInstanceProfile", action!(
            Write, "Grants permission to add a role to an instance profile",
            "https://docs.aws.amazon.com/IAM/latest/APIReference/API_AddRoleToInstanceProfile.html",
            ["AWS::Iam::InstanceProfile"]
        ));
        m.insert("iam:CreateGroup", action!(
            Write, "Grants permission to create a new group",
            "https://docs.aws.amazon.com/IAM/latest/APIReference/API_CreateGroup.html",
            ["AWS::Iam::Group"]
        ));
        m.insert("iam:CreateInstanceProfile", action!(
            Write, "Grants permission to create a new instance profile",
            "https://docs.aws.amazon.com/IAM/latest/APIReference/API_CreateInstanceProfile.html",
            ["AWS::Iam::InstanceProfile"]
        ));
        m.insert("iam:CreatePolicy", action!(
            Write, "Grants permission to create a new managed policy",
            "https://docs.aws.amazon.com/IAM/latest/APIReference/API_CreatePolicy.html",
            ["AWS::Iam::Policy"]
        ));
        m.insert("iam:CreateRole", action!(
            Write, "Grants permission to create a new role",
            "https://docs.aws.amazon.com/IAM/latest/APIReference/API_CreateRole.html",
            ["AWS::Iam::Role"]
        ));
        m.insert("iam:CreateUser", action!(
            Write, "Grants permission to create a new user",
            "https://docs.aws.amazon.com/IAM/latest/APIReference/API_CreateUser.html",
            ["AWS::Iam::User"]
        ));
        m.insert("iam:CreateLoginProfile", action!(
            Write, "Grants permission to create a password for a user, giving the user console access",
            "https://docs.aws.amazon.com/IAM/latest/APIReference/API_CreateLoginProfile.html",
            ["AWS::Iam::User"]
        ));
        m.insert("iam:UpdateLoginProfile", action!(
            Write, "Grants permission to change the password for a user",
            "https://docs.aws.amazon.com/IAM/latest/APIReference/API_UpdateLoginProfile.html",
            ["AWS::Iam::User"]
        ));
        m.insert("iam:PutGroupPolicy", action!(
            PermissionsManagement, "Grants permission to add an inline policy to a group",
            "https://docs.aws.amazon.com/IAM/latest/APIReference/API_PutGroupPolicy.html",
            ["AWS::Iam::Group"]
        ));
        m.insert("iam:PutRolePolicy", action!(
            PermissionsManagement, "Grants permission to add an inline policy to a role",
            "https://docs.aws.amazon.com/IAM/latest/APIReference/API_PutRolePolicy.html",
            ["AWS::Iam::Role"]
        ));
        m.insert("iam:PutUserPolicy", action!(
            PermissionsManagement, "Grants permission to add an inline policy to a user",
            "https://docs.aws.amazon.com/IAM/latest/APIReference/API_PutUserPolicy.html",
            ["AWS::Iam::User"]
        ));
        m.insert("iam:UpdateAssumeRolePolicy", action!(
            PermissionsManagement, "Grants permission to update the trust policy of a role",
            "https://docs.aws.amazon.com/IAM/latest/APIReference/API_UpdateAssumeRolePolicy.html",
            ["AWS::Iam::Role"]
        ));
        m.insert("iam:PassRole", action!(
            PermissionsManagement, "Grants permission to pass a role to a service",
            "https://docs.aws.amazon.com/IAM/latest/APIReference/API_PassRole.html",
            ["AWS::Iam::Role"]
        ));
        m.insert("iam:CreateAccessKey", action!(
            Write, "Grants permission to create a new access key for a user",
            "https://docs.aws.amazon.com/IAM/latest/APIReference/API_CreateAccessKey.html",
            ["AWS::Iam::User"]
        ));
        m.insert("iam:DeleteAccessKey", action!(
            Write, "Grants permission to delete an access key for a user",
            "https://docs.aws.amazon.com/IAM/latest/APIReference/API_DeleteAccessKey.html",
            ["AWS::Iam::User"]
        ));
        m.insert("iam:ListAccessKeys", action!(
            ListOnly, "Grants permission to list the access keys for a user",
            "https://docs.aws.amazon.com/IAM/latest/APIReference/API_ListAccessKeys.html",
            ["AWS::Iam::User"]
        ));
        m.insert("iam:GetUser", action!(
            Read, "Grants permission to retrieve information about a user",
            "https://docs.aws.amazon.com/IAM/latest/APIReference/API_GetUser.html",
            ["AWS::Iam::User"]
        ));
        m.insert("iam:ListUsers", action!(
            ListOnly, "Grants permission to list users",
            "https://docs.aws.amazon.com/IAM/latest/APIReference/API_ListUsers.html",
            ["AWS::Iam::User"]
        ));
        m.insert("iam:GetPolicy", action!(
            Read, "Grants permission to retrieve information about a managed policy",
            "https://docs.aws.amazon.com/IAM/latest/APIReference/API_GetPolicy.html",
            ["AWS::Iam::Policy"]
        ));
        m.insert("iam:TagUser", action!(
            Tagging, "Grants permission to add tags to a user",
            "https://docs.aws.amazon.com/IAM/latest/APIReference/API_TagUser.html",
            ["AWS::Iam::User"]
        ));
        m.insert("sts:AssumeRole", action!(
            Write, "Grants permission to assume a role",
            "https://docs.aws.amazon.com/STS/latest/APIReference/API_AssumeRole.html",
            ["AWS::Iam::Role"]
        ));
        m.insert("ec2:AssociateIamInstanceProfile", action!(
            Write, "Grants permission to associate an instance profile with a running or stopped instance",
            "https://docs.aws.amazon.com/AWSEC2/latest/APIReference/API_AssociateIamInstanceProfile.html",
            ["AWS::Ec2::Instance"]
        ));
        m.insert("ec2:RunInstances", action!(
            Write, "Grants permission to launch one or more instances",
            "https://docs.aws.amazon.com/AWSEC2/latest/APIReference/API_RunInstances.html",
            ["AWS::Ec2::Instance"]
        ));
        m.insert("ec2:DescribeInstances", action!(
            Read, "Grants permission to describe one or more instances",
            "https://docs.aws.amazon.com/AWSEC2/latest/APIReference/API_DescribeInstances.html",
            ["AWS::Ec2::Instance"]
        ));
        m.insert("ec2:CreateSnapshot", action!(
            Write, "Grants permission to create a snapshot of an EBS volume",
            "https://docs.aws.amazon.com/AWSEC2/latest/APIReference/API_CreateSnapshot.html",
            ["AWS::Ec2::Volume"]
        ));
        m.insert("s3:GetObject", action!(
            Read, "Grants permission to retrieve an object from a bucket",
            "https://docs.aws.amazon.com/AmazonS3/latest/API/API_GetObject.html",
            ["AWS::S3::Object"]
        ));
        m.insert("s3:PutObject", action!(
            Write, "Grants permission to add an object to a bucket",
            "https://docs.aws.amazon.com/AmazonS3/latest/API/API_PutObject.html",
            ["AWS::S3::Object"]
        ));
        m.insert("s3:DeleteObject", action!(
            Write, "Grants permission to remove an object from a bucket",
            "https://docs.aws.amazon.com/AmazonS3/latest/API/API_DeleteObject.html",
            ["AWS::S3::Object"]
        ));
        m.insert("s3:ListBucket", action!(
            ListOnly, "Grants permission to list some or all of the objects in a bucket",
            "https://docs.aws.amazon.com/AmazonS3/latest/API/API_ListObjectsV2.html",
            ["AWS::S3::Bucket"]
        ));
        m.insert("s3:ListBucketVersions", action!(
            ListOnly, "Grants permission to list metadata about all versions of objects in a bucket",
            "https://docs.aws.amazon.com/AmazonS3/latest/API/API_ListObjectVersions.html",
            ["AWS::S3::Bucket"]
        ));
        m.insert("s3:ListBucketMultipartUploads", action!(
            ListOnly, "Grants permission to list in-progress multipart uploads",
            "https://docs.aws.amazon.com/AmazonS3/latest/API/API_ListMultipartUploads.html",
            ["AWS::S3::Bucket"]
        ));
        m.insert("s3:GetBucketAcl", action!(
            Read, "Grants permission to retrieve the access control list of a bucket",
            "https://docs.aws.amazon.com/AmazonS3/latest/API/API_GetBucketAcl.html",
            ["AWS::S3::Bucket"]
        ));
        m.insert("s3:PutBucketAcl", action!(
            PermissionsManagement, "Grants permission to set the access control list permissions for a bucket",
            "https://docs.aws.amazon.com/AmazonS3/latest/API/API_PutBucketAcl.html",
            ["AWS::S3::Bucket"]
        ));

        m
    };
}

/// Resolve a single literal action name. Glob expansion is performed by the
/// policy resolver, not the catalog itself (: the catalog is
/// read-only reference data).
pub fn get(name: &str) -> Option<&'static ActionDef> {
    ACTIONS.get(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test_log::test]
    fn test_catalog_covers_template_actions() {
        for name in [
            "iam:CreatePolicyVersion",
            "ec2:AssociateIamInstanceProfile",
            "sts:AssumeRole",
            "iam:AddUserToGroup",
            "iam:AttachGroupPolicy",
            "iam:AttachRolePolicy",
            "iam:AttachUserPolicy",
            "iam:CreateGroup",
            "ec2:RunInstances",
            "iam:CreateInstanceProfile",
            "iam:CreatePolicy",
            "iam:CreateRole",
            "iam:CreateUser",
            "iam:CreateLoginProfile",
            "iam:PutGroupPolicy",
            "iam:PutRolePolicy",
            "iam:PutUserPolicy",
            "iam:UpdateAssumeRolePolicy",
            "iam:UpdateLoginProfile",
            "iam:CreateAccessKey",
            "iam:DeleteAccessKey",
            "iam:PassRole",
        ] {
            assert!(get(name).is_some(), "missing catalog entry for {name}");
        }
    }

    #[test_log::test]
    fn test_access_as_str() {
        assert_eq!(Access::PermissionsManagement.as_str(), "Permissions management");
    }
}
