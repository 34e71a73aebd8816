use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ContactMethod {
    Email,
    Sms,
}

/// A persisted contact record.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Contact {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub birthday: Option<NaiveDate>,
    pub extra: Option<String>,
    pub preferred_contact_method: Option<ContactMethod>,
    pub sent: bool,
}

/// The full set of mutable attributes, used for create and full replace.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewContact {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub birthday: Option<NaiveDate>,
    #[serde(default)]
    pub extra: Option<String>,
    #[serde(default)]
    pub preferred_contact_method: Option<ContactMethod>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sent: bool,
}

/// Treat an explicit `null` like an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl NewContact {
    pub fn new(first_name: &str, last_name: &str, email: &str) -> Self {
        Self {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: email.to_string(),
            phone: None,
            birthday: None,
            extra: None,
            preferred_contact_method: None,
            sent: false,
        }
    }

    pub fn with_birthday(mut self, birthday: NaiveDate) -> Self {
        self.birthday = Some(birthday);
        self
    }
}

/// A single field of a partial update.
///
/// `Unset` means the field was not supplied and must be left alone, which is
/// different from `Null` (explicitly cleared).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Patch<T> {
    Unset,
    Null,
    Value(T),
}

// Derived Default would require `T: Default`
impl<T> Default for Patch<T> {
    fn default() -> Self {
        Patch::Unset
    }
}

impl<T> Patch<T> {
    pub fn is_unset(&self) -> bool {
        matches!(self, Patch::Unset)
    }

    /// Apply to an optional attribute.
    pub fn apply_to(self, target: &mut Option<T>) {
        match self {
            Patch::Unset => {}
            Patch::Null => *target = None,
            Patch::Value(value) => *target = Some(value),
        }
    }

    /// Apply to a required attribute; callers reject `Null` before getting here.
    pub fn apply_required(self, target: &mut T) {
        if let Patch::Value(value) = self {
            *target = value;
        }
    }
}

// Only invoked when the key is present, so a missing key stays `Unset`
// through `#[serde(default)]`.
impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(value) => Patch::Value(value),
            None => Patch::Null,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ContactPatch {
    pub first_name: Patch<String>,
    pub last_name: Patch<String>,
    pub email: Patch<String>,
    pub phone: Patch<String>,
    pub birthday: Patch<NaiveDate>,
    pub extra: Patch<String>,
    pub preferred_contact_method: Patch<ContactMethod>,
    pub sent: Patch<bool>,
}

impl ContactPatch {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_unset()
            && self.last_name.is_unset()
            && self.email.is_unset()
            && self.phone.is_unset()
            && self.birthday.is_unset()
            && self.extra.is_unset()
            && self.preferred_contact_method.is_unset()
            && self.sent.is_unset()
    }

    /// Overwrite every supplied field of `contact`, leaving the rest untouched.
    pub fn apply(self, contact: &mut Contact) {
        self.first_name.apply_required(&mut contact.first_name);
        self.last_name.apply_required(&mut contact.last_name);
        self.email.apply_required(&mut contact.email);
        self.phone.apply_to(&mut contact.phone);
        self.birthday.apply_to(&mut contact.birthday);
        self.extra.apply_to(&mut contact.extra);
        self.preferred_contact_method
            .apply_to(&mut contact.preferred_contact_method);
        self.sent.apply_required(&mut contact.sent);
    }
}

impl Contact {
    pub fn from_new(id: i64, new: NewContact) -> Self {
        Self {
            id,
            first_name: new.first_name,
            last_name: new.last_name,
            email: new.email,
            phone: new.phone,
            birthday: new.birthday,
            extra: new.extra,
            preferred_contact_method: new.preferred_contact_method,
            sent: new.sent,
        }
    }
}
