use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::repository::Entity;
use crate::validation::{
    normalize_email, validate_age, validate_name, validate_non_negative,
    validate_non_negative_int, validate_password, validate_phone, Validated, ValidationError,
};

/// Query-only label; it grants nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Member,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Member => "member",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "member" => Ok(Role::Member),
            "admin" => Ok(Role::Admin),
            other => Err(ValidationError::new("role", format!("unknown role '{other}'"))),
        }
    }
}

/// Email and phone, validated together.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Contact {
    email: String,
    phone: String,
}

impl Contact {
    pub fn new(email: &str, phone: &str) -> Validated<Self> {
        let email = normalize_email(email)?;
        validate_phone(phone)?;
        Ok(Self {
            email,
            phone: phone.trim().to_string(),
        })
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn phone(&self) -> &str {
        &self.phone
    }

    pub fn set_email(&mut self, email: &str) -> Validated {
        self.email = normalize_email(email)?;
        Ok(())
    }

    pub fn set_phone(&mut self, phone: &str) -> Validated {
        validate_phone(phone)?;
        self.phone = phone.trim().to_string();
        Ok(())
    }
}

/// Raw registration input, as collected from the operator.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub name: String,
    pub password: String,
    pub age: i32,
    pub weight: i32,
    pub height: f64,
    pub calorie_goal: i32,
    pub email: String,
    pub phone: String,
    pub role: Role,
}

/// A registered person. `password` holds the plaintext only until the user facade
/// replaces it with a digest on save.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    id: Option<Uuid>,
    name: String,
    #[serde(skip_serializing)]
    password: String,
    age: i32,
    weight: i32,
    height: f64,
    calorie_goal: i32,
    contact: Contact,
    role: Role,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    last_login: Option<OffsetDateTime>,
}

impl TryFrom<NewUser> for User {
    type Error = ValidationError;

    fn try_from(input: NewUser) -> Result<Self, Self::Error> {
        validate_name("name", &input.name)?;
        validate_password(&input.password)?;
        validate_age(input.age)?;
        validate_non_negative_int("weight", input.weight)?;
        validate_non_negative("height", input.height)?;
        validate_non_negative_int("calorie_goal", input.calorie_goal)?;
        let contact = Contact::new(&input.email, &input.phone)?;

        Ok(Self {
            id: None,
            name: input.name.trim().to_string(),
            password: input.password,
            age: input.age,
            weight: input.weight,
            height: input.height,
            calorie_goal: input.calorie_goal,
            contact,
            role: input.role,
            created_at: OffsetDateTime::now_utc(),
            last_login: None,
        })
    }
}

impl User {
    pub fn id(&self) -> Option<Uuid> {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Plaintext before the first save, the stored digest afterwards.
    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn age(&self) -> i32 {
        self.age
    }

    pub fn weight(&self) -> i32 {
        self.weight
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn calorie_goal(&self) -> i32 {
        self.calorie_goal
    }

    pub fn contact(&self) -> &Contact {
        &self.contact
    }

    pub fn email(&self) -> &str {
        self.contact.email()
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    pub fn last_login(&self) -> Option<OffsetDateTime> {
        self.last_login
    }

    pub fn set_name(&mut self, name: &str) -> Validated {
        validate_name("name", name)?;
        self.name = name.trim().to_string();
        Ok(())
    }

    /// Takes a new plaintext password; the facade hashes it on update.
    pub fn set_password(&mut self, password: &str) -> Validated {
        validate_password(password)?;
        self.password = password.to_string();
        Ok(())
    }

    pub fn set_age(&mut self, age: i32) -> Validated {
        validate_age(age)?;
        self.age = age;
        Ok(())
    }

    pub fn set_weight(&mut self, weight: i32) -> Validated {
        validate_non_negative_int("weight", weight)?;
        self.weight = weight;
        Ok(())
    }

    pub fn set_height(&mut self, height: f64) -> Validated {
        validate_non_negative("height", height)?;
        self.height = height;
        Ok(())
    }

    pub fn set_calorie_goal(&mut self, calorie_goal: i32) -> Validated {
        validate_non_negative_int("calorie_goal", calorie_goal)?;
        self.calorie_goal = calorie_goal;
        Ok(())
    }

    pub fn set_contact(&mut self, contact: Contact) {
        self.contact = contact;
    }

    pub fn set_role(&mut self, role: Role) {
        self.role = role;
    }

    /// Re-runs every field check; used by the facade before writing.
    pub fn validate(&self) -> Validated {
        validate_name("name", &self.name)?;
        validate_password(&self.password)?;
        validate_age(self.age)?;
        validate_non_negative_int("weight", self.weight)?;
        validate_non_negative("height", self.height)?;
        validate_non_negative_int("calorie_goal", self.calorie_goal)?;
        Ok(())
    }

    pub(crate) fn assign_id(&mut self, id: Uuid) {
        self.id = Some(id);
    }

    pub(crate) fn replace_password_digest(&mut self, digest: String) {
        self.password = digest;
    }

    pub(crate) fn stamp_login(&mut self, at: OffsetDateTime) {
        self.last_login = Some(at);
    }
}

impl Entity for User {
    const NAME: &'static str = "User";

    fn id(&self) -> Option<Uuid> {
        self.id
    }
}

// Bookkeeping timestamps are not part of a user's identity.
impl PartialEq for User {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.name == other.name
            && self.password == other.password
            && self.age == other.age
            && self.weight == other.weight
            && self.height.to_bits() == other.height.to_bits()
            && self.calorie_goal == other.calorie_goal
            && self.contact == other.contact
            && self.role == other.role
    }
}

impl Eq for User {}

impl Hash for User {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.name.hash(state);
        self.password.hash(state);
        self.age.hash(state);
        self.weight.hash(state);
        self.height.to_bits().hash(state);
        self.calorie_goal.hash(state);
        self.contact.hash(state);
        self.role.hash(state);
    }
}

/// User record in the database.
#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub name: String,
    pub password_hash: String,
    pub age: i32,
    pub weight: i32,
    pub height: f64,
    pub calorie_goal: i32,
    pub email: String,
    pub phone: String,
    pub role: String,
    pub created_at: OffsetDateTime,
    pub last_login: Option<OffsetDateTime>,
}

/// Fails when the stored role is not one this build knows.
impl TryFrom<UserRow> for User {
    type Error = ValidationError;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        let role = r.role.parse()?;
        Ok(Self {
            id: Some(r.id),
            name: r.name,
            password: r.password_hash,
            age: r.age,
            weight: r.weight,
            height: r.height,
            calorie_goal: r.calorie_goal,
            contact: Contact {
                email: r.email,
                phone: r.phone,
            },
            role,
            created_at: r.created_at,
            last_login: r.last_login,
        })
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "John".into(),
            password: "password123".into(),
            age: 25,
            weight: 80,
            height: 1.8,
            calorie_goal: 2200,
            email: email.into(),
            phone: "1234567890".into(),
            role: Role::Member,
        }
    }

    pub fn user(email: &str) -> User {
        User::try_from(new_user(email)).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::hash_map::DefaultHasher;

    use super::fixtures::{new_user, user};
    use super::*;

    fn hash_of<T: Hash>(value: &T) -> u64 {
        let mut h = DefaultHasher::new();
        value.hash(&mut h);
        h.finish()
    }

    #[test]
    fn try_from_rejects_out_of_range_age() {
        let mut input = new_user("john@example.com");
        input.age = 17;
        let err = User::try_from(input).unwrap_err();
        assert_eq!(err.field, "age");

        let mut input = new_user("john@example.com");
        input.age = 101;
        assert!(User::try_from(input).is_err());
    }

    #[test]
    fn try_from_rejects_blank_name_bad_email_and_bad_phone() {
        let mut input = new_user("john@example.com");
        input.name = " ".into();
        assert_eq!(User::try_from(input).unwrap_err().field, "name");

        assert_eq!(User::try_from(new_user("nope")).unwrap_err().field, "email");

        let mut input = new_user("john@example.com");
        input.phone = "12".into();
        assert_eq!(User::try_from(input).unwrap_err().field, "phone");
    }

    #[test]
    fn email_is_normalized() {
        let u = user("  John@Example.com");
        assert_eq!(u.email(), "john@example.com");
    }

    #[test]
    fn setters_validate_before_mutating() {
        let mut u = user("john@example.com");
        assert!(u.set_age(12).is_err());
        assert_eq!(u.age(), 25);
        assert!(u.set_weight(-1).is_err());
        assert_eq!(u.weight(), 80);
        assert!(u.set_password("").is_err());
        assert_eq!(u.password(), "password123");
        assert!(u.set_age(40).is_ok());
        assert_eq!(u.age(), 40);
    }

    #[test]
    fn equality_ignores_timestamps_and_matches_hash() {
        let a = user("john@example.com");
        let mut b = a.clone();
        b.stamp_login(OffsetDateTime::now_utc());
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));

        b.set_name("Johnny").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn role_parses_case_insensitively() {
        assert_eq!("ADMIN".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("member".parse::<Role>().unwrap(), Role::Member);
        assert!("root".parse::<Role>().is_err());
    }

    fn row(role: &str) -> UserRow {
        UserRow {
            id: Uuid::new_v4(),
            name: "John".into(),
            password_hash: "$argon2id$stored".into(),
            age: 25,
            weight: 80,
            height: 1.8,
            calorie_goal: 2200,
            email: "john@example.com".into(),
            phone: "1234567890".into(),
            role: role.into(),
            created_at: OffsetDateTime::now_utc(),
            last_login: None,
        }
    }

    #[test]
    fn stored_row_decodes_with_its_role() {
        let u = User::try_from(row("admin")).unwrap();
        assert_eq!(u.role(), Role::Admin);
        assert_eq!(u.password(), "$argon2id$stored");
        assert!(u.id().is_some());
    }

    #[test]
    fn stored_row_with_unknown_role_is_rejected() {
        let err = User::try_from(row("chef")).unwrap_err();
        assert_eq!(err.field, "role");
    }

    #[test]
    fn serialization_hides_password() {
        let u = user("john@example.com");
        let json = serde_json::to_string(&u).unwrap();
        assert!(json.contains("john@example.com"));
        assert!(!json.contains("password123"));
    }
}
