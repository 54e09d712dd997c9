//! YouTube channel sign-up form
//!
//! The value shape, every field registration with its rules, and the two
//! collaborators backed by the user directory: the email availability check
//! and the seed default values.

use crate::error::{FormError, Result};
use crate::remote::RemoteLookup;
use crate::state::forms::{
    AsyncValidator, DefaultValuesSource, FieldKind, FieldOptions, FieldPath, Form, FormOptions,
    ItemField, Rules,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

pub const USERNAME: &str = "username";
pub const EMAIL: &str = "email";
pub const CHANNEL: &str = "channel";
pub const TWITTER: &str = "social.twitter";
pub const FACEBOOK: &str = "social.facebook";
pub const PRIMARY_PHONE: &str = "phoneNumbers.0";
pub const SECONDARY_PHONE: &str = "phoneNumbers.1";
pub const PH_NUMBERS: &str = "phNumbers";
pub const AGE: &str = "age";
pub const DOB: &str = "dob";

const EMAIL_PATTERN: &str = r"^[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}$";
const DEFAULT_USERNAME: &str = "Batman";

pub const EMAIL_TAKEN: &str = "Email already exists";
pub const EMAIL_UNVERIFIED: &str = "Could not verify email availability";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormValues {
    pub username: String,
    pub email: String,
    pub channel: String,
    pub social: Social,
    pub phone_numbers: Vec<String>,
    pub ph_numbers: Vec<PhNumber>,
    pub age: Option<f64>,
    pub dob: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Social {
    /// Left out of the payload while disabled
    #[serde(default)]
    pub twitter: String,
    #[serde(default)]
    pub facebook: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhNumber {
    pub number: String,
}

impl Default for FormValues {
    fn default() -> Self {
        Self {
            username: DEFAULT_USERNAME.to_string(),
            email: String::new(),
            channel: String::new(),
            social: Social::default(),
            phone_numbers: vec![String::new(), String::new()],
            ph_numbers: vec![PhNumber::default()],
            age: None,
            dob: None,
        }
    }
}

/// Build the form with every field registered.
///
/// With `lookup` set the email gets an availability check. With `loading`
/// set the form waits for `SeedDefaults` and shows the static defaults until
/// then.
pub fn build_form(
    options: FormOptions,
    lookup: Option<Arc<dyn RemoteLookup>>,
    loading: bool,
) -> Result<Form<FormValues>> {
    let mut form = if loading {
        Form::with_loading(FormValues::default(), options)?
    } else {
        Form::new(FormValues::default(), options)?
    };
    register_fields(&mut form, lookup)?;
    Ok(form)
}

pub fn register_fields(
    form: &mut Form<FormValues>,
    lookup: Option<Arc<dyn RemoteLookup>>,
) -> Result<()> {
    form.register(
        USERNAME,
        FieldOptions::new("Username").rules(Rules::new().required("Username is required")),
    )?;

    let pattern = RegexBuilder::new(EMAIL_PATTERN)
        .case_insensitive(true)
        .build()?;
    let mut email_rules = Rules::new()
        .pattern(pattern, "Invalid email format")
        .validate("notAdmin", |value| {
            if value == "admin@example.com" {
                Err("Enter a different email address".to_string())
            } else {
                Ok(())
            }
        })
        .validate("notBlackListed", |value| {
            if value.as_str().is_some_and(|v| v.ends_with("baddomain.com")) {
                Err("This domain is not supported".to_string())
            } else {
                Ok(())
            }
        });
    if let Some(lookup) = lookup {
        email_rules = email_rules.validate_async("emailAvailable", Arc::new(EmailAvailable::new(lookup)));
    }
    form.register(
        EMAIL,
        FieldOptions::new("E-mail").kind(FieldKind::Email).rules(email_rules),
    )?;

    form.register(
        CHANNEL,
        FieldOptions::new("Channel").rules(Rules::new().required("Channel is required")),
    )?;
    form.register(
        TWITTER,
        FieldOptions::new("Twitter").rules(Rules::new().required("Enter twitter profile")),
    )?;
    form.register(FACEBOOK, FieldOptions::new("Facebook"))?;
    form.register(PRIMARY_PHONE, FieldOptions::new("Primary phone number"))?;
    form.register(SECONDARY_PHONE, FieldOptions::new("Secondary phone number"))?;
    form.register_array(
        PH_NUMBERS,
        vec![ItemField::new(
            FieldPath::parse("number")?,
            FieldOptions::new("List of phone numbers"),
        )],
    )?;
    form.register(
        AGE,
        FieldOptions::new("Age").kind(FieldKind::Number).rules(
            Rules::new()
                .required("Age is required")
                .min(0.0, "Age must be a positive number"),
        ),
    )?;
    form.register(
        DOB,
        FieldOptions::new("Date of birth")
            .kind(FieldKind::Date)
            .rules(Rules::new().required("Date of birth is required")),
    )?;

    sync_dependent_fields(form)
}

/// Twitter is only asked for once a channel name is given
pub fn sync_dependent_fields(form: &mut Form<FormValues>) -> Result<()> {
    let channel_empty = form
        .get_value(CHANNEL)
        .and_then(Value::as_str)
        .map_or(true, str::is_empty);
    form.set_disabled(TWITTER, channel_empty)
}

/// Rejects emails that are already registered in the directory
pub struct EmailAvailable {
    lookup: Arc<dyn RemoteLookup>,
}

impl EmailAvailable {
    pub fn new(lookup: Arc<dyn RemoteLookup>) -> Self {
        Self { lookup }
    }
}

#[async_trait]
impl AsyncValidator for EmailAvailable {
    async fn validate(&self, value: &Value) -> std::result::Result<(), String> {
        let Some(email) = value.as_str() else {
            return Ok(());
        };
        match self.lookup.find_users_by_email(email).await {
            Ok(users) if users.is_empty() => Ok(()),
            Ok(_) => Err(EMAIL_TAKEN.to_string()),
            Err(err) => {
                tracing::warn!("email availability check failed: {err:#}");
                Err(EMAIL_UNVERIFIED.to_string())
            }
        }
    }
}

/// Default values seeded from the directory's first user
pub struct SeedDefaults {
    lookup: Arc<dyn RemoteLookup>,
}

impl SeedDefaults {
    pub fn new(lookup: Arc<dyn RemoteLookup>) -> Self {
        Self { lookup }
    }
}

#[async_trait]
impl DefaultValuesSource<FormValues> for SeedDefaults {
    async fn load(&self) -> Result<FormValues> {
        let user = self
            .lookup
            .fetch_seed_user()
            .await
            .map_err(|err| FormError::remote(format!("{err:#}")))?;

        Ok(FormValues {
            username: DEFAULT_USERNAME.to_string(),
            email: user.email,
            ..FormValues::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{MockRemoteLookup, SeedUser};
    use crate::state::forms::{ErrorKind, KeepState, SubmitOutcome, ValidationMode};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Mutex;

    fn form() -> Form<FormValues> {
        build_form(FormOptions::default(), None, false).unwrap()
    }

    fn on_change_form() -> Form<FormValues> {
        build_form(
            FormOptions {
                mode: ValidationMode::OnChange,
                ..FormOptions::default()
            },
            None,
            false,
        )
        .unwrap()
    }

    async fn fill_valid(form: &mut Form<FormValues>) {
        form.change(EMAIL, "bruce@wayne.com").await.unwrap();
        form.change(CHANNEL, "Gotham").await.unwrap();
        sync_dependent_fields(form).unwrap();
        form.change(TWITTER, "@batman").await.unwrap();
        form.change(AGE, "35").await.unwrap();
        form.change(DOB, "1989-02-19").await.unwrap();
    }

    fn user(email: &str) -> SeedUser {
        SeedUser {
            id: 1,
            name: "Leanne Graham".to_string(),
            username: "Bret".to_string(),
            email: email.to_string(),
        }
    }

    mod registration {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn test_defaults() {
            let form = form();
            assert_eq!(form.get_value(USERNAME), Some(&json!("Batman")));
            assert_eq!(form.get_value(PRIMARY_PHONE), Some(&json!("")));
            assert_eq!(form.fields(PH_NUMBERS).unwrap().len(), 1);
            assert!(form.field("phNumbers.0.number").is_some());
        }

        #[test]
        fn test_twitter_disabled_until_channel_given() {
            let form = form();
            assert!(form.is_disabled(TWITTER));
        }

        #[tokio::test]
        async fn test_twitter_enabled_by_channel() {
            let mut form = form();
            form.change(CHANNEL, "Gotham").await.unwrap();
            sync_dependent_fields(&mut form).unwrap();
            assert!(!form.is_disabled(TWITTER));

            form.change(CHANNEL, "").await.unwrap();
            sync_dependent_fields(&mut form).unwrap();
            assert!(form.is_disabled(TWITTER));
        }
    }

    mod rules {
        use super::*;
        use pretty_assertions::assert_eq;

        #[tokio::test]
        async fn test_required_messages_block_submission() {
            let mut form = form();
            form.change(USERNAME, "").await.unwrap();

            let outcome = form.handle_submit(|_| async { Ok(()) }).await.unwrap();

            let SubmitOutcome::Invalid(errors) = outcome else {
                panic!("expected invalid submission");
            };
            assert_eq!(errors[USERNAME].message, "Username is required");
            assert_eq!(errors[CHANNEL].message, "Channel is required");
            assert_eq!(errors[AGE].message, "Age is required");
            assert_eq!(errors[DOB].message, "Date of birth is required");
            // Disabled while channel is empty
            assert!(!errors.contains_key(TWITTER));
            assert_eq!(
                errors.keys().collect::<Vec<_>>(),
                vec![USERNAME, CHANNEL, AGE, DOB]
            );
        }

        #[tokio::test]
        async fn test_twitter_required_once_enabled() {
            let mut form = form();
            form.change(CHANNEL, "Gotham").await.unwrap();
            sync_dependent_fields(&mut form).unwrap();
            assert!(!form.trigger(&[TWITTER]).await.unwrap());
            assert_eq!(form.error(TWITTER).unwrap().message, "Enter twitter profile");
        }

        #[tokio::test]
        async fn test_email_messages() {
            let mut form = on_change_form();

            form.change(EMAIL, "not-an-email").await.unwrap();
            assert_eq!(form.error(EMAIL).unwrap().message, "Invalid email format");

            form.change(EMAIL, "admin@example.com").await.unwrap();
            assert_eq!(
                form.error(EMAIL).unwrap().message,
                "Enter a different email address"
            );

            form.change(EMAIL, "joker@baddomain.com").await.unwrap();
            let error = form.error(EMAIL).unwrap();
            assert_eq!(error.message, "This domain is not supported");
            assert_eq!(error.kind, ErrorKind::Validate("notBlackListed".to_string()));

            form.change(EMAIL, "Bruce@Wayne.COM").await.unwrap();
            assert!(form.error(EMAIL).is_none());
        }

        #[tokio::test]
        async fn test_age_must_not_be_negative() {
            let mut form = on_change_form();
            form.change(AGE, "-1").await.unwrap();
            assert_eq!(form.error(AGE).unwrap().message, "Age must be a positive number");
        }

        #[tokio::test]
        async fn test_invalid_date_counts_as_missing() {
            let mut form = on_change_form();
            form.change(DOB, "2023-02-30").await.unwrap();
            assert_eq!(form.error(DOB).unwrap().kind, ErrorKind::Required);
        }
    }

    mod submission {
        use super::*;
        use pretty_assertions::assert_eq;

        #[tokio::test]
        async fn test_valid_submission_delivers_typed_values() {
            let mut form = form();
            fill_valid(&mut form).await;
            form.change("phNumbers.0.number", "555-0100").await.unwrap();

            let received = Arc::new(Mutex::new(None));
            let sink = received.clone();
            let outcome = form
                .handle_submit(|values| async move {
                    *sink.lock().unwrap() = Some(values);
                    Ok(())
                })
                .await
                .unwrap();
            assert_eq!(outcome, SubmitOutcome::Submitted);

            let values = received.lock().unwrap().clone().unwrap();
            assert_eq!(values.username, "Batman");
            assert_eq!(values.social.twitter, "@batman");
            assert_eq!(values.age, Some(35.0));
            assert_eq!(values.dob, NaiveDate::from_ymd_opt(1989, 2, 19));
            assert_eq!(values.ph_numbers[0].number, "555-0100");
        }

        #[tokio::test]
        async fn test_disabled_twitter_left_out_of_payload() {
            let mut form = form();
            fill_valid(&mut form).await;
            form.change(CHANNEL, "").await.unwrap();
            sync_dependent_fields(&mut form).unwrap();

            assert!(form.payload()["social"].get("twitter").is_none());
            // Channel itself is now missing, but twitter carries no error
            form.handle_submit(|_| async { Ok(()) }).await.unwrap();
            assert!(form.error(TWITTER).is_none());
        }

        #[tokio::test]
        async fn test_reset_on_success_keeps_submit_count() {
            let mut form = form();
            fill_valid(&mut form).await;
            form.append(PH_NUMBERS, json!({"number": "555"})).unwrap();

            form.handle_submit(|_| async { Ok(()) }).await.unwrap();
            assert!(form.lifecycle().is_submit_successful);

            form.reset(
                None,
                KeepState {
                    keep_submit_count: true,
                    ..Default::default()
                },
            )
            .unwrap();
            sync_dependent_fields(&mut form).unwrap();

            assert_eq!(form.values_as().unwrap(), FormValues::default());
            assert_eq!(form.lifecycle().submit_count, 1);
            assert!(!form.is_dirty());
            assert!(form.is_disabled(TWITTER));
            assert_eq!(form.fields(PH_NUMBERS).unwrap().len(), 1);
        }
    }

    mod remote {
        use super::*;
        use pretty_assertions::assert_eq;

        #[tokio::test]
        async fn test_email_already_exists() {
            let mut mock = MockRemoteLookup::new();
            mock.expect_find_users_by_email().returning(|email| {
                if email == "Sincere@april.biz" {
                    Ok(vec![user(email)])
                } else {
                    Ok(vec![])
                }
            });
            let lookup: Arc<dyn RemoteLookup> = Arc::new(mock);
            let validator = EmailAvailable::new(lookup);

            assert_eq!(
                validator.validate(&json!("Sincere@april.biz")).await,
                Err(EMAIL_TAKEN.to_string())
            );
            assert_eq!(validator.validate(&json!("free@wayne.com")).await, Ok(()));
        }

        #[tokio::test]
        async fn test_failed_check_is_a_field_error() {
            let mut mock = MockRemoteLookup::new();
            mock.expect_find_users_by_email()
                .returning(|_| Err(anyhow::anyhow!("timed out")));
            let mut form = build_form(
                FormOptions {
                    mode: ValidationMode::OnChange,
                    ..FormOptions::default()
                },
                Some(Arc::new(mock)),
                false,
            )
            .unwrap();

            form.change(EMAIL, "bruce@wayne.com").await.unwrap();
            assert_eq!(form.error(EMAIL).unwrap().message, EMAIL_UNVERIFIED);
        }

        #[tokio::test]
        async fn test_availability_not_checked_for_invalid_email() {
            let mut mock = MockRemoteLookup::new();
            mock.expect_find_users_by_email().times(0);
            let mut form = build_form(
                FormOptions {
                    mode: ValidationMode::OnChange,
                    ..FormOptions::default()
                },
                Some(Arc::new(mock)),
                false,
            )
            .unwrap();

            form.change(EMAIL, "admin@example.com").await.unwrap();
            form.change(EMAIL, "").await.unwrap();
            assert!(form.error(EMAIL).is_none());
        }

        #[tokio::test]
        async fn test_seed_defaults_fill_email() {
            let mut mock = MockRemoteLookup::new();
            mock.expect_fetch_seed_user()
                .times(1)
                .returning(|| Ok(user("Sincere@april.biz")));
            let lookup: Arc<dyn RemoteLookup> = Arc::new(mock);
            let mut form = build_form(FormOptions::default(), None, true).unwrap();
            assert!(form.lifecycle().is_loading);

            form.load_defaults(&SeedDefaults::new(lookup)).await.unwrap();

            assert!(!form.lifecycle().is_loading);
            assert_eq!(form.get_value(EMAIL), Some(&json!("Sincere@april.biz")));
            assert_eq!(form.get_value(USERNAME), Some(&json!("Batman")));
            assert_eq!(form.field(EMAIL).unwrap().input, "Sincere@april.biz");
        }

        #[tokio::test]
        async fn test_seed_failure_falls_back_to_static_defaults() {
            let mut mock = MockRemoteLookup::new();
            mock.expect_fetch_seed_user()
                .returning(|| Err(anyhow::anyhow!("connection refused")));
            let lookup: Arc<dyn RemoteLookup> = Arc::new(mock);
            let mut form = build_form(FormOptions::default(), None, true).unwrap();

            let result = form.load_defaults(&SeedDefaults::new(lookup)).await;

            assert!(matches!(result, Err(FormError::Remote(_))));
            assert!(!form.lifecycle().is_loading);
            assert_eq!(form.values_as().unwrap(), FormValues::default());
        }
    }
}
