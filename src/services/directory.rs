//! User directory and class catalog.
//!
//! DESIGN
//! ======
//! The directory is an in-memory list of accounts seeded at startup. Lookups
//! are synchronous methods on [`Directory`]; the two operations that touch
//! password hashes ([`authenticate`] and [`register`]) are async wrappers that run
//! argon2 on the blocking pool and only hold the lock for the list access.
//!
//! Email comparison is case-insensitive everywhere. A person may hold the
//! same email under different roles (e.g. a parent who is also registered as
//! a student), so uniqueness is per (email, role).

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

/// Password shared by every seeded demo account.
pub const DEMO_PASSWORD: &str = "password123";

// =============================================================================
// ROLES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Parent,
    Admin,
    Teacher,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Student, Role::Parent, Role::Admin, Role::Teacher];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Parent => "parent",
            Self::Admin => "admin",
            Self::Teacher => "teacher",
        }
    }

    /// Capitalized form used in user-facing messages.
    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Self::Student => "Student",
            Self::Parent => "Parent",
            Self::Admin => "Admin",
            Self::Teacher => "Teacher",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(raw.trim()))
    }

    /// Roles that may create their own account.
    #[must_use]
    pub fn can_self_register(self) -> bool {
        matches!(self, Self::Student | Self::Parent)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// TYPES
// =============================================================================

/// A stored account. Never serialized; see [`PublicUser`].
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub parent_id: Option<String>,
    pub student_ids: Vec<String>,
    pub class_ids: Vec<String>,
}

/// Account projection without the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub student_ids: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub class_ids: Vec<String>,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            parent_id: user.parent_id.clone(),
            student_ids: user.student_ids.clone(),
            class_ids: user.class_ids.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassInfo {
    pub id: String,
    pub name: String,
    pub teacher: String,
    pub students: u32,
}

/// Self-service registration form.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub role: Role,
    #[serde(default)]
    pub parent_email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DemoCredentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("User already exists")]
    UserExists,
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error("invalid email")]
    InvalidEmail,
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("{0} accounts cannot be self-registered")]
    RoleNotRegistrable(Role),
    #[error("password hashing failed: {0}")]
    Hash(String),
}

impl crate::error::ErrorCode for DirectoryError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::UserExists => "E_USER_EXISTS",
            Self::PasswordMismatch => "E_PASSWORD_MISMATCH",
            Self::InvalidEmail => "E_INVALID_EMAIL",
            Self::MissingField(_) => "E_MISSING_FIELD",
            Self::RoleNotRegistrable(_) => "E_ROLE_NOT_REGISTRABLE",
            Self::Hash(_) => "E_PASSWORD_HASH",
        }
    }
}

// =============================================================================
// PASSWORDS
// =============================================================================

/// Argon2 settings used for new hashes. Verification reads the parameters
/// embedded in each stored hash, so changing these never locks anyone out.
#[derive(Clone)]
pub struct PasswordPolicy {
    argon2: Argon2<'static>,
}

impl PasswordPolicy {
    /// Minimum-cost parameters for tests.
    #[must_use]
    pub fn fast_insecure() -> Self {
        let params = Params::new(Params::MIN_M_COST, 1, 1, None).unwrap_or_default();
        Self { argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params) }
    }

    /// Hash a password into a PHC string.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::Hash`] if argon2 rejects the input.
    pub fn hash(&self, password: &str) -> Result<String, DirectoryError> {
        let salt_bytes: [u8; 16] = rand::rng().random();
        let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| DirectoryError::Hash(e.to_string()))?;
        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| DirectoryError::Hash(e.to_string()))
    }

    #[must_use]
    pub fn verify(&self, hash: &str, password: &str) -> bool {
        PasswordHash::new(hash).is_ok_and(|parsed| {
            self.argon2
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
    }
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self { argon2: Argon2::default() }
    }
}

async fn run_blocking<T: Send + 'static>(f: impl FnOnce() -> T + Send + 'static) -> Result<T, DirectoryError> {
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| DirectoryError::Hash(e.to_string()))
}

// =============================================================================
// DIRECTORY
// =============================================================================

pub struct Directory {
    users: Vec<User>,
    classes: Vec<ClassInfo>,
    policy: PasswordPolicy,
}

impl Directory {
    /// Empty directory with the default class catalog.
    #[must_use]
    pub fn new(policy: PasswordPolicy) -> Self {
        Self { users: Vec::new(), classes: default_classes(), policy }
    }

    /// Directory holding the demo accounts, all with [`DEMO_PASSWORD`].
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::Hash`] if the demo password cannot be hashed.
    pub fn seeded(policy: PasswordPolicy) -> Result<Self, DirectoryError> {
        let hash = policy.hash(DEMO_PASSWORD)?;
        let mut dir = Self::new(policy);
        dir.users = seed_users(&hash);
        Ok(dir)
    }

    #[must_use]
    pub fn policy(&self) -> PasswordPolicy {
        self.policy.clone()
    }

    #[must_use]
    pub fn user_by_id(&self, id: &str) -> Option<PublicUser> {
        self.find(id).map(PublicUser::from)
    }

    fn find(&self, id: &str) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    /// Accounts with this email, any role.
    fn by_email<'a>(&'a self, email: &'a str) -> impl Iterator<Item = &'a User> + 'a {
        self.users
            .iter()
            .filter(move |u| u.email.eq_ignore_ascii_case(email))
    }

    #[must_use]
    pub fn students_by_parent_id(&self, parent_id: &str) -> Vec<PublicUser> {
        self.users
            .iter()
            .filter(|u| u.role == Role::Student && u.parent_id.as_deref() == Some(parent_id))
            .map(PublicUser::from)
            .collect()
    }

    #[must_use]
    pub fn all_students(&self) -> Vec<PublicUser> {
        self.users
            .iter()
            .filter(|u| u.role == Role::Student)
            .map(PublicUser::from)
            .collect()
    }

    /// Children listed on the parent record. Empty for non-parents.
    #[must_use]
    pub fn children_for_parent(&self, parent_id: &str) -> Vec<PublicUser> {
        let Some(parent) = self.find(parent_id).filter(|u| u.role == Role::Parent) else {
            return Vec::new();
        };
        self.users
            .iter()
            .filter(|u| parent.student_ids.contains(&u.id))
            .map(PublicUser::from)
            .collect()
    }

    /// True when `parent_id` is a parent that lists `student_id` as a child.
    #[must_use]
    pub fn is_parent_of(&self, parent_id: &str, student_id: &str) -> bool {
        self.find(parent_id)
            .is_some_and(|p| p.role == Role::Parent && p.student_ids.iter().any(|s| s == student_id))
    }

    #[must_use]
    pub fn all_classes(&self) -> Vec<ClassInfo> {
        self.classes.clone()
    }

    #[must_use]
    pub fn classes_by_student_id(&self, student_id: &str) -> Vec<ClassInfo> {
        self.classes_for(student_id)
    }

    #[must_use]
    pub fn classes_by_teacher_id(&self, teacher_id: &str) -> Vec<ClassInfo> {
        self.classes_for(teacher_id)
    }

    /// Classes listed on the account, whatever its role.
    fn classes_for(&self, user_id: &str) -> Vec<ClassInfo> {
        let Some(user) = self.find(user_id) else {
            return Vec::new();
        };
        self.classes
            .iter()
            .filter(|c| user.class_ids.contains(&c.id))
            .cloned()
            .collect()
    }

    /// Insert an already-validated, already-hashed account.
    fn insert(&mut self, form: &Registration, email: String, password_hash: String) -> Result<PublicUser, DirectoryError> {
        if self.by_email(&email).any(|u| u.role == form.role) {
            return Err(DirectoryError::UserExists);
        }

        let id = format!("{}-{}", form.role, Uuid::new_v4().simple());
        let parent_id = match (form.role, form.parent_email.as_deref().and_then(normalize_email)) {
            (Role::Student, Some(parent_email)) => self
                .by_email(&parent_email)
                .find(|u| u.role == Role::Parent)
                .map(|p| p.id.clone()),
            _ => None,
        };

        if let Some(pid) = &parent_id {
            if let Some(parent) = self.users.iter_mut().find(|u| &u.id == pid) {
                parent.student_ids.push(id.clone());
            }
        }

        let user = User {
            id,
            name: form.name.trim().to_owned(),
            email,
            password_hash,
            role: form.role,
            parent_id,
            student_ids: Vec::new(),
            class_ids: Vec::new(),
        };
        let public = PublicUser::from(&user);
        self.users.push(user);
        Ok(public)
    }
}

// =============================================================================
// ASYNC OPERATIONS
// =============================================================================

/// Verify credentials. When the email exists under several roles, the account
/// matching `preferred_role` is checked first.
///
/// Returns `Ok(None)` for an unknown email or wrong password.
///
/// # Errors
///
/// Returns [`DirectoryError::Hash`] if the verification task fails.
pub async fn authenticate(
    dir: &RwLock<Directory>,
    email: &str,
    password: &str,
    preferred_role: Option<Role>,
) -> Result<Option<PublicUser>, DirectoryError> {
    let Some(email) = normalize_email(email) else {
        return Ok(None);
    };
    let (candidate, policy) = {
        let dir = dir.read().await;
        let candidate = dir
            .by_email(&email)
            .find(|u| Some(u.role) == preferred_role)
            .or_else(|| dir.by_email(&email).next())
            .cloned();
        (candidate, dir.policy())
    };
    let Some(user) = candidate else {
        return Ok(None);
    };

    let hash = user.password_hash.clone();
    let password = password.to_owned();
    let valid = run_blocking(move || policy.verify(&hash, &password)).await?;
    Ok(valid.then(|| PublicUser::from(&user)))
}

/// Create a student or parent account.
///
/// # Errors
///
/// Returns a validation error, [`DirectoryError::UserExists`] for a duplicate
/// (email, role) pair, or [`DirectoryError::Hash`].
pub async fn register(dir: &RwLock<Directory>, form: Registration) -> Result<PublicUser, DirectoryError> {
    let email = validate_registration(&form)?;

    let policy = dir.read().await.policy();
    let password = form.password.clone();
    let password_hash = run_blocking(move || policy.hash(&password)).await??;

    let user = dir.write().await.insert(&form, email, password_hash)?;
    info!(user_id = %user.id, role = %user.role, "directory: account registered");
    Ok(user)
}

/// Check a registration form, returning the normalized email.
fn validate_registration(form: &Registration) -> Result<String, DirectoryError> {
    if !form.role.can_self_register() {
        return Err(DirectoryError::RoleNotRegistrable(form.role));
    }
    if form.name.trim().is_empty() {
        return Err(DirectoryError::MissingField("name"));
    }
    let email = normalize_email(&form.email).ok_or(DirectoryError::InvalidEmail)?;
    if form.password.is_empty() {
        return Err(DirectoryError::MissingField("password"));
    }
    if form.password != form.confirm_password {
        return Err(DirectoryError::PasswordMismatch);
    }
    Ok(email)
}

// =============================================================================
// HELPERS
// =============================================================================

#[must_use]
pub fn normalize_email(email: &str) -> Option<String> {
    let normalized = email.trim().to_ascii_lowercase();
    let (local, domain) = normalized.split_once('@')?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return None;
    }
    Some(normalized)
}

/// Demo login for each portal. Unknown roles get an empty pair.
#[must_use]
pub fn demo_credentials(role: &str) -> DemoCredentials {
    let email = match Role::parse(role) {
        Some(Role::Student) => "arjun.s@example.com",
        Some(Role::Parent) => "rajesh.s@example.com",
        Some(Role::Admin) => "ramesh.k@example.com",
        Some(Role::Teacher) => "sunita.s@example.com",
        None => return DemoCredentials { email: String::new(), password: String::new() },
    };
    DemoCredentials { email: email.into(), password: DEMO_PASSWORD.into() }
}

fn ids(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|s| (*s).to_owned()).collect()
}

fn seed_users(hash: &str) -> Vec<User> {
    let user = |id: &str, name: &str, email: &str, role: Role| User {
        id: id.into(),
        name: name.into(),
        email: email.into(),
        password_hash: hash.to_owned(),
        role,
        parent_id: None,
        student_ids: Vec::new(),
        class_ids: Vec::new(),
    };
    vec![
        User {
            parent_id: Some("parent-1".into()),
            class_ids: ids(&["class-1", "class-2", "class-3"]),
            ..user("student-1", "Arjun Singh", "arjun.s@example.com", Role::Student)
        },
        User {
            parent_id: Some("parent-2".into()),
            class_ids: ids(&["class-1", "class-3"]),
            ..user("student-2", "Priya Patel", "priya.p@example.com", Role::Student)
        },
        User {
            student_ids: ids(&["student-1"]),
            ..user("parent-1", "Rajesh Singh", "rajesh.s@example.com", Role::Parent)
        },
        User {
            student_ids: ids(&["student-2"]),
            ..user("parent-2", "Meena Patel", "meena.p@example.com", Role::Parent)
        },
        user("admin-1", "Ramesh Kumar", "ramesh.k@example.com", Role::Admin),
        User {
            class_ids: ids(&["class-1", "class-2"]),
            ..user("teacher-1", "Sunita Sharma", "sunita.s@example.com", Role::Teacher)
        },
    ]
}

fn default_classes() -> Vec<ClassInfo> {
    [
        ("class-1", "Mathematics", "Sunita Sharma", 25),
        ("class-2", "Science", "Sunita Sharma", 30),
        ("class-3", "English", "Anand Verma", 28),
        ("class-4", "History", "Deepak Gupta", 22),
    ]
    .into_iter()
    .map(|(id, name, teacher, students)| ClassInfo { id: id.into(), name: name.into(), teacher: teacher.into(), students })
    .collect()
}

#[cfg(test)]
#[path = "directory_test.rs"]
mod tests;
