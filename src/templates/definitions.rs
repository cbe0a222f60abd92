//! The static attack-template table. `AddRoleToInstanceProfile` and
//! `CreateSnapshot` are intentionally absent — both are known to produce
//! false positives; see DESIGN.md.

use super::schema::AttackTemplate;
use lazy_static::lazy_static;

lazy_static! {
    pub static ref TEMPLATES: Vec<AttackTemplate> = vec![
        AttackTemplate {
            name: "CreatePolicyVersion",
            description: "Overwrite the default version of the target managed policy",
            commands: &["aws iam create-policy-version --policy-arn ${AWS::Iam::Policy}.Arn --set-as-default --policy-document <admin-policy>"],
            create_action: false,
            admin: true,
            depends: None,
            requires: &["iam:CreatePolicyVersion"],
            affects: "AWS::Iam::Policy",
            inner_grants: None,
            extra_constraints: &[],
            grants: Some("Admin"),
        },
        AttackTemplate {
            name: "AssociateInstanceProfile",
            description: "Associate the specified instance with the target instance profile",
            commands: &["aws ec2 associate-iam-instance-profile --iam-instance-profile Name=${AWS::Iam::InstanceProfile} --instance-id ${AWS::Ec2::Instance}"],
            create_action: false,
            admin: false,
            depends: Some("AWS::Ec2::Instance"),
            requires: &["ec2:AssociateIamInstanceProfile"],
            affects: "AWS::Ec2::Instance",
            inner_grants: Some("AWS::Iam::InstanceProfile"),
            extra_constraints: &[
                "(${AWS::Iam::InstanceProfile})-[{Name:'Attached'}]->(${AWS::Iam::Role})",
                "(${})-[:TRANSITIVE*..]->()-[{Name:'iam:PassRole'}]->(${AWS::Iam::Role})",
            ],
            grants: Some("Attached"),
        },
        AttackTemplate {
            name: "AssumeRole",
            description: "Retrieve a set of temporary security credentials by assuming the target role",
            commands: &["aws sts assume-role --role-arn ${AWS::Iam::Role}.Arn --role-session-name AssumeRole"],
            create_action: false,
            admin: false,
            depends: None,
            requires: &["sts:AssumeRole"],
            affects: "AWS::Iam::Role",
            inner_grants: None,
            extra_constraints: &["(${})<-[:TRUSTS{Name:'sts:AssumeRole'}]-(${AWS::Iam::Role})"],
            grants: Some("AssumeRole"),
        },
        AttackTemplate {
            name: "AddUserToGroup",
            description: "Add the specified user to the target group",
            commands: &["aws iam add-user-to-group --user-name ${AWS::Iam::User} --group-name ${AWS::Iam::Group}"],
            create_action: false,
            admin: false,
            depends: Some("AWS::Iam::User"),
            requires: &["iam:AddUserToGroup"],
            affects: "AWS::Iam::Group",
            inner_grants: None,
            extra_constraints: &[],
            grants: Some("MemberOf"),
        },
        AttackTemplate {
            name: "AttachGroupPolicy",
            description: "Attach the target managed policy to the specified group",
            commands: &["aws iam attach-group-policy --group-name ${AWS::Iam::Group} --policy-arn ${AWS::Iam::Policy}.Arn"],
            create_action: false,
            admin: false,
            depends: Some("AWS::Iam::Group"),
            requires: &["iam:AttachGroupPolicy"],
            affects: "AWS::Iam::Group",
            inner_grants: Some("AWS::Iam::Policy"),
            extra_constraints: &[],
            grants: Some("Attached"),
        },
        AttackTemplate {
            name: "AttachRolePolicy",
            description: "Attach the target managed policy to the specified role",
            commands: &["aws iam attach-role-policy --role-name ${AWS::Iam::Role} --policy-arn ${AWS::Iam::Policy}.Arn"],
            create_action: false,
            admin: false,
            depends: Some("AWS::Iam::Role"),
            requires: &["iam:AttachRolePolicy"],
            affects: "AWS::Iam::Role",
            inner_grants: Some("AWS::Iam::Policy"),
            extra_constraints: &[],
            grants: Some("Attached"),
        },
        AttackTemplate {
            name: "AttachUserPolicy",
            description: "Attach the target managed policy to the specified user",
            commands: &["aws iam attach-user-policy --user-name ${AWS::Iam::User} --policy-arn ${AWS::Iam::Policy}.Arn"],
            create_action: false,
            admin: false,
            depends: Some("AWS::Iam::User"),
            requires: &["iam:AttachUserPolicy"],
            affects: "AWS::Iam::User",
            inner_grants: Some("AWS::Iam::Policy"),
            extra_constraints: &[],
            grants: Some("Attached"),
        },
        AttackTemplate {
            name: "CreateGroup",
            description: "Create a new group and add the specified user to it",
            commands: &[
                "aws iam create-group --group-name ${AWS::Iam::Group}",
                "aws iam add-user-to-group --user-name ${AWS::Iam::User} --group-name ${AWS::Iam::Group}",
            ],
            create_action: true,
            admin: false,
            depends: Some("AWS::Iam::User"),
            requires: &["iam:CreateGroup", "iam:AddUserToGroup"],
            affects: "AWS::Iam::Group",
            inner_grants: None,
            extra_constraints: &[],
            grants: None,
        },
        AttackTemplate {
            name: "CreateInstance",
            description: "Launch a new Ec2 instance",
            commands: &["aws ec2 run-instances --count 1 --instance-type t2.micro --image-id $ami-id"],
            create_action: true,
            admin: false,
            depends: None,
            requires: &["ec2:RunInstances"],
            affects: "AWS::Ec2::Instance",
            inner_grants: None,
            extra_constraints: &[],
            grants: None,
        },
        AttackTemplate {
            name: "CreateInstanceProfile",
            description: "Create a new instance profile",
            commands: &["aws iam create-instance-profile --instance-profile-name ${AWS::Iam::InstanceProfile}"],
            create_action: true,
            admin: false,
            depends: None,
            requires: &["iam:CreateInstanceProfile"],
            affects: "AWS::Iam::InstanceProfile",
            inner_grants: None,
            extra_constraints: &[],
            grants: None,
        },
        AttackTemplate {
            name: "CreatePolicy",
            description: "Create a new managed policy",
            commands: &["aws iam create-policy --policy-name $policy-name --policy-document <admin-policy>"],
            create_action: true,
            admin: false,
            depends: None,
            requires: &["iam:CreatePolicy"],
            affects: "AWS::Iam::Policy",
            inner_grants: None,
            extra_constraints: &[],
            grants: None,
        },
        AttackTemplate {
            name: "CreateRole",
            description: "Create a new role",
            commands: &["aws iam create-role --role-name ${AWS::Iam::Role} --assume-role-policy-document *"],
            create_action: true,
            admin: false,
            depends: None,
            requires: &["iam:CreateRole"],
            affects: "AWS::Iam::Role",
            inner_grants: None,
            extra_constraints: &[],
            grants: Some("AssumeRole"),
        },
        AttackTemplate {
            name: "CreateUserLoginProfile",
            description: "Create a new user",
            commands: &[
                "aws iam create-user --user-name ${AWS::Iam::User}",
                "aws iam create-login-profile --user-name ${AWS::Iam::User} --password $new-password",
            ],
            create_action: true,
            admin: false,
            depends: None,
            requires: &["iam:CreateUser", "iam:CreateLoginProfile"],
            affects: "AWS::Iam::User",
            inner_grants: None,
            extra_constraints: &[],
            grants: None,
        },
        AttackTemplate {
            name: "PutGroupPolicy",
            description: "Add a new administrative inline policy document to the target group",
            commands: &["aws iam put-group-policy --group-name ${AWS::Iam::Group} --policy-name Admin --policy-document <admin-policy>"],
            create_action: false,
            admin: true,
            depends: Some("AWS::Iam::Group"),
            requires: &["iam:PutGroupPolicy"],
            affects: "AWS::Iam::Group",
            inner_grants: None,
            extra_constraints: &[],
            grants: None,
        },
        AttackTemplate {
            name: "PutRolePolicy",
            description: "Add a new administrative inline policy document to the target role",
            commands: &["aws iam put-role-policy --role-name ${AWS::Iam::Role} --policy-name Admin --policy-document <admin-policy>"],
            create_action: false,
            admin: true,
            depends: Some("AWS::Iam::Role"),
            requires: &["iam:PutRolePolicy"],
            affects: "AWS::Iam::Role",
            inner_grants: None,
            extra_constraints: &[],
            grants: None,
        },
        AttackTemplate {
            name: "PutUserPolicy",
            description: "Add a new administrative inline policy document to the target user",
            commands: &["aws iam put-user-policy --user-name ${AWS::Iam::User} --policy-name Admin --policy-document <admin-policy>"],
            create_action: false,
            admin: true,
            depends: Some("AWS::Iam::User"),
            requires: &["iam:PutUserPolicy"],
            affects: "AWS::Iam::User",
            inner_grants: None,
            extra_constraints: &[],
            grants: None,
        },
        AttackTemplate {
            name: "UpdateRole",
            description: "Update the assume-role policy document of the target role and assume it thereafter",
            commands: &[
                "aws iam update-assume-role-policy --role-name ${AWS::Iam::Role} --policy-document *",
                "aws sts assume-role --role-arn ${AWS::Iam::Role}.Arn --role-session-name AssumeRole",
            ],
            create_action: false,
            admin: false,
            depends: None,
            requires: &["iam:UpdateAssumeRolePolicy"],
            affects: "AWS::Iam::Role",
            inner_grants: None,
            extra_constraints: &[],
            grants: Some("AssumeRole"),
        },
        AttackTemplate {
            name: "UpdateUserLoginProfile",
            description: "Reset the target user's console password and login as them",
            commands: &["aws iam update-login-profile --user-name ${AWS::Iam::User} --password $Password"],
            create_action: false,
            admin: false,
            depends: None,
            requires: &["iam:UpdateLoginProfile"],
            affects: "AWS::Iam::User",
            inner_grants: None,
            extra_constraints: &[],
            grants: Some("ChangePassword"),
        },
        AttackTemplate {
            name: "SetUserLoginProfile",
            description: "Set a console password for the target user and login as them, nothing has been set before",
            commands: &["aws iam create-login-profile --user-name ${AWS::Iam::User} --password $Password"],
            create_action: false,
            admin: false,
            depends: None,
            requires: &["iam:CreateLoginProfile"],
            affects: "AWS::Iam::User",
            inner_grants: None,
            extra_constraints: &["${AWS::Iam::User}.LoginProfile IS NULL"],
            grants: Some("SetPassword"),
        },
        AttackTemplate {
            name: "CreateUserAccessKey",
            description: "Create an access key for the target user and authenticate as them using the API",
            commands: &["aws iam create-access-key --user-name ${AWS::Iam::User}"],
            create_action: false,
            admin: false,
            depends: None,
            requires: &["iam:CreateAccessKey"],
            affects: "AWS::Iam::User",
            inner_grants: None,
            extra_constraints: &["(COALESCE(SIZE(SPLIT(${AWS::Iam::User}.AccessKeys,'Status')), 1) - 1) < 2"],
            grants: Some("CreateAccessKey"),
        },
        AttackTemplate {
            name: "ReplaceUserAccessKey",
            description: "Create, or replace, an access key for the target user and authenticate as them using the API",
            commands: &[
                "aws iam delete-access-key --user-name ${AWS::Iam::User} --access-key-id $AccessKeyId",
                "aws iam create-access-key --user-name ${AWS::Iam::User}",
            ],
            create_action: false,
            admin: false,
            depends: None,
            requires: &["iam:DeleteAccessKey", "iam:CreateAccessKey"],
            affects: "AWS::Iam::User",
            inner_grants: None,
            extra_constraints: &["(SIZE(SPLIT(${AWS::Iam::User}.AccessKeys,'Status')) - 1) > 0"],
            grants: Some("ReplaceAccessKey"),
        },
    ];
}

pub fn get(name: &str) -> Option<&'static AttackTemplate> {
    TEMPLATES.iter().find(|t| t.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test_log::test]
    fn test_excluded_templates_are_absent() {
        assert!(get("AddRoleToInstanceProfile").is_none());
        assert!(get("CreateSnapshot").is_none());
    }

    #[test_log::test]
    fn test_all_active_templates_present() {
        assert_eq!(TEMPLATES.len(), 21);
    }

    #[test_log::test]
    fn test_create_policy_version_is_simple_mode() {
        let t = get("CreatePolicyVersion").unwrap();
        assert!(t.is_simple_mode());
        assert!(t.admin);
    }

    #[test_log::test]
    fn test_associate_instance_profile_is_general_mode() {
        let t = get("AssociateInstanceProfile").unwrap();
        assert!(!t.is_simple_mode());
        assert_eq!(t.depends, Some("AWS::Ec2::Instance"));
    }

    #[test_log::test]
    fn test_create_templates_have_no_outer_grants() {
        for name in ["CreateGroup", "CreateInstance", "CreateInstanceProfile", "CreatePolicy", "CreateUserLoginProfile"] {
            let t = get(name).unwrap();
            assert!(t.create_action);
            assert!(t.grants.is_none(), "{name} should have no outer Grants");
        }
    }
}
