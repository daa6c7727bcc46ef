//! Form rules for every submission the desk accepts.
//!
//! Each form exposes `validate()` returning all field errors at once so a
//! frontend can render them next to the offending inputs. Nothing here does IO.

use std::fmt;
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;

use crate::models::{Attachment, DepositMethod, KycDocumentType, ProfilePatch, TicketPriority};

pub const SUBJECT_MIN_LEN: usize = 5;
pub const DESCRIPTION_MIN_LEN: usize = 10;
pub const DESCRIPTION_MAX_LEN: usize = 1000;
pub const MAX_ATTACHMENTS: usize = 5;
pub const MAX_ATTACHMENT_BYTES: u64 = 10 * 1024 * 1024;
pub const MAX_AVATAR_BYTES: u64 = 5 * 1024 * 1024;
pub const PHONE_MIN_LEN: usize = 10;

const ALLOWED_MIME_PREFIXES: [&str; 2] = ["image/", "video/"];
const ALLOWED_MIME_TYPES: [&str; 3] = [
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn single(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            errors: vec![FieldError::new(field, message)],
        }
    }

    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    pub fn for_field(&self, field: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    fn into_result(self) -> Result<(), ValidationErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<String> = self.errors.iter().map(|e| e.to_string()).collect();
        f.write_str(&joined.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
    })
}

fn phone_regex() -> &'static Regex {
    static PHONE: OnceLock<Regex> = OnceLock::new();
    PHONE.get_or_init(|| Regex::new(r"^[+]?[\d\s\-()]+$").expect("phone pattern is valid"))
}

fn char_len(s: &str) -> usize {
    s.trim().chars().count()
}

fn check_email(errors: &mut ValidationErrors, email: &str) {
    if email.trim().is_empty() {
        errors.push("email", "Email is required");
    } else if !email_regex().is_match(email.trim()) {
        errors.push("email", "Invalid email address");
    }
}

fn check_phone(errors: &mut ValidationErrors, phone: &str) {
    let phone = phone.trim();
    if phone.is_empty() {
        errors.push("phone", "Phone number is required");
    } else if !phone_regex().is_match(phone) {
        errors.push("phone", "Invalid phone number");
    } else if phone.chars().count() < PHONE_MIN_LEN {
        errors.push("phone", "Phone number must be at least 10 digits");
    }
}

fn check_min(
    errors: &mut ValidationErrors,
    field: &'static str,
    label: &str,
    value: &str,
    min: usize,
) {
    let len = char_len(value);
    if len == 0 {
        errors.push(field, format!("{label} is required"));
    } else if len < min {
        errors.push(field, format!("{label} must be at least {min} characters"));
    }
}

fn non_blank(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

// ============================================================================
// Attachments
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AttachmentRejection {
    UnsupportedType,
    TooLarge,
}

impl fmt::Display for AttachmentRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttachmentRejection::UnsupportedType => f.write_str("unsupported file type"),
            AttachmentRejection::TooLarge => f.write_str("file exceeds 10MB"),
        }
    }
}

pub fn attachment_rejection(file: &Attachment) -> Option<AttachmentRejection> {
    let mime = file.mime_type.to_ascii_lowercase();
    let type_ok = ALLOWED_MIME_PREFIXES.iter().any(|p| mime.starts_with(p))
        || ALLOWED_MIME_TYPES.contains(&mime.as_str());
    if !type_ok {
        return Some(AttachmentRejection::UnsupportedType);
    }
    if file.size > MAX_ATTACHMENT_BYTES {
        return Some(AttachmentRejection::TooLarge);
    }
    None
}

/// Outcome of screening a batch of files picked for a ticket.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttachmentBatch {
    pub accepted: Vec<Attachment>,
    pub rejected: Vec<(Attachment, AttachmentRejection)>,
}

/// Screen `incoming` files against type and size rules.
///
/// When the accepted files would push the total past [`MAX_ATTACHMENTS`], the
/// whole batch is refused and nothing is accepted.
pub fn screen_attachments(
    existing: usize,
    incoming: Vec<Attachment>,
) -> Result<AttachmentBatch, FieldError> {
    let mut batch = AttachmentBatch::default();
    for file in incoming {
        match attachment_rejection(&file) {
            Some(reason) => batch.rejected.push((file, reason)),
            None => batch.accepted.push(file),
        }
    }
    if existing + batch.accepted.len() > MAX_ATTACHMENTS {
        return Err(FieldError::new(
            "attachments",
            format!("Maximum {MAX_ATTACHMENTS} files allowed"),
        ));
    }
    Ok(batch)
}

// ============================================================================
// Ticket form
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct NewTicket {
    pub department_id: String,
    pub subject: String,
    pub priority: TicketPriority,
    pub description: String,
    pub attachments: Vec<Attachment>,
}

impl NewTicket {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();

        if self.department_id.trim().is_empty() {
            errors.push("department", "Department is required");
        }

        let subject_len = char_len(&self.subject);
        if subject_len == 0 {
            errors.push("subject", "Subject is required");
        } else if subject_len < SUBJECT_MIN_LEN {
            errors.push(
                "subject",
                format!("Subject must be at least {SUBJECT_MIN_LEN} characters"),
            );
        }

        let description_len = char_len(&self.description);
        if description_len == 0 {
            errors.push("description", "Description is required");
        } else if description_len < DESCRIPTION_MIN_LEN {
            errors.push(
                "description",
                format!("Description must be at least {DESCRIPTION_MIN_LEN} characters"),
            );
        } else if description_len > DESCRIPTION_MAX_LEN {
            errors.push(
                "description",
                format!("Description cannot exceed {DESCRIPTION_MAX_LEN} characters"),
            );
        }

        if self.attachments.len() > MAX_ATTACHMENTS {
            errors.push("attachments", format!("Maximum {MAX_ATTACHMENTS} files allowed"));
        }
        for file in &self.attachments {
            if let Some(reason) = attachment_rejection(file) {
                errors.push("attachments", format!("{}: {}", file.name, reason));
            }
        }

        errors.into_result()
    }
}

// ============================================================================
// Auth forms
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        check_email(&mut errors, &self.email);
        if self.password.is_empty() {
            errors.push("password", "Password is required");
        } else if self.password.chars().count() < 6 {
            errors.push("password", "Password must be at least 6 characters");
        }
        errors.into_result()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignupForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub agree_to_terms: bool,
}

impl SignupForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();

        let name_len = char_len(&self.name);
        if name_len == 0 {
            errors.push("name", "Full name is required");
        } else if name_len < 2 {
            errors.push("name", "Name must be at least 2 characters");
        } else if name_len > 50 {
            errors.push("name", "Name must be less than 50 characters");
        }

        check_email(&mut errors, &self.email);

        if self.password.is_empty() {
            errors.push("password", "Password is required");
        } else if self.password.chars().count() < 8 {
            errors.push("password", "Password must be at least 8 characters");
        } else if !(self.password.chars().any(|c| c.is_ascii_lowercase())
            && self.password.chars().any(|c| c.is_ascii_uppercase())
            && self.password.chars().any(|c| c.is_ascii_digit()))
        {
            errors.push(
                "password",
                "Password must contain at least one uppercase letter, one lowercase letter, and one number",
            );
        }

        if self.confirm_password.is_empty() {
            errors.push("confirmPassword", "Please confirm your password");
        } else if self.confirm_password != self.password {
            errors.push("confirmPassword", "Passwords must match");
        }

        if !self.agree_to_terms {
            errors.push("agreeToTerms", "You must agree to the terms and conditions");
        }

        errors.into_result()
    }
}

// ============================================================================
// Funding forms
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct DepositForm {
    pub account_id: String,
    pub method: DepositMethod,
    pub amount: f64,
    pub currency: String,
}

impl DepositForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        if self.account_id.trim().is_empty() {
            errors.push("accountId", "Account is required");
        }
        let (min, max) = (self.method.min_amount(), self.method.max_amount());
        if !self.amount.is_finite() || self.amount < min {
            errors.push("amount", format!("Minimum amount is ${min}"));
        } else if self.amount > max {
            errors.push("amount", format!("Maximum amount is ${max}"));
        }
        if self.currency.trim().is_empty() {
            errors.push("currency", "Currency is required");
        }
        errors.into_result()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransferForm {
    pub from_account: String,
    pub to_account: String,
    pub amount: f64,
    pub currency: String,
}

impl TransferForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        if self.from_account.trim().is_empty() {
            errors.push("fromAccount", "Source account is required");
        }
        if self.to_account.trim().is_empty() {
            errors.push("toAccount", "Destination account is required");
        } else if self.to_account == self.from_account {
            errors.push("toAccount", "Cannot transfer to the same account");
        }
        if !self.amount.is_finite() || self.amount <= 0.0 {
            errors.push("amount", "Amount must be greater than zero");
        }
        if self.currency.trim().is_empty() {
            errors.push("currency", "Currency is required");
        }
        errors.into_result()
    }
}

// ============================================================================
// KYC form
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct KycUploadForm {
    pub document_type: KycDocumentType,
    pub document_number: String,
    pub expiry_date: Option<NaiveDate>,
    pub file: Option<Attachment>,
}

impl KycUploadForm {
    /// `today` is injected so expiry checks are deterministic.
    pub fn validate(&self, today: NaiveDate) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        if self.document_number.trim().is_empty() {
            errors.push("documentNumber", "Document number is required");
        }
        match self.expiry_date {
            None => errors.push("expiryDate", "Expiry date is required"),
            Some(d) if d <= today => errors.push("expiryDate", "Document must not be expired"),
            Some(_) => {}
        }
        if self.file.is_none() {
            errors.push("file", "Document file is required");
        }
        errors.into_result()
    }
}

// ============================================================================
// Profile form
// ============================================================================

/// Avatars are images only, capped at [`MAX_AVATAR_BYTES`].
pub fn avatar_rejection(file: &Attachment) -> Option<&'static str> {
    if !file.mime_type.to_ascii_lowercase().starts_with("image/") {
        Some("Please select a valid image file")
    } else if file.size > MAX_AVATAR_BYTES {
        Some("File size must be less than 5MB")
    } else {
        None
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub date_of_birth: Option<NaiveDate>,
    pub address: String,
    pub city: String,
    pub country: String,
    pub postal_code: String,
    pub avatar: Option<Attachment>,
}

impl ProfileForm {
    /// `today` is injected so the birth date check is deterministic.
    pub fn validate(&self, today: NaiveDate) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();

        for (field, label, value) in [
            ("firstName", "First name", &self.first_name),
            ("lastName", "Last name", &self.last_name),
        ] {
            let len = char_len(value);
            if len == 0 {
                errors.push(field, format!("{label} is required"));
            } else if len < 2 {
                errors.push(field, format!("{label} must be at least 2 characters"));
            } else if len > 50 {
                errors.push(field, format!("{label} must be less than 50 characters"));
            }
        }

        check_email(&mut errors, &self.email);
        check_phone(&mut errors, &self.phone);

        match self.date_of_birth {
            None => errors.push("dateOfBirth", "Date of birth is required"),
            Some(d) if d > today => errors.push("dateOfBirth", "Date of birth cannot be in the future"),
            Some(_) => {}
        }

        check_min(&mut errors, "address", "Address", &self.address, 5);
        check_min(&mut errors, "city", "City", &self.city, 2);
        check_min(&mut errors, "country", "Country", &self.country, 2);
        check_min(&mut errors, "postalCode", "Postal code", &self.postal_code, 3);

        if let Some(message) = self.avatar.as_ref().and_then(avatar_rejection) {
            errors.push("avatar", message);
        }

        errors.into_result()
    }

    /// Trimmed values as a `PATCH /users/:id` body.
    pub fn to_patch(&self) -> ProfilePatch {
        ProfilePatch {
            first_name: non_blank(&self.first_name),
            last_name: non_blank(&self.last_name),
            email: non_blank(&self.email),
            phone: non_blank(&self.phone),
            date_of_birth: self.date_of_birth,
            address: non_blank(&self.address),
            city: non_blank(&self.city),
            country: non_blank(&self.country),
            postal_code: non_blank(&self.postal_code),
        }
    }
}

// ============================================================================
// Introducing-broker application
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IbForm {
    pub company_name: String,
    pub contact_person: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub experience: String,
}

impl IbForm {
    /// Address and experience are optional; the rest is required.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        check_min(&mut errors, "companyName", "Company name", &self.company_name, 2);
        check_min(&mut errors, "contactPerson", "Contact person", &self.contact_person, 2);
        check_email(&mut errors, &self.email);
        check_phone(&mut errors, &self.phone);
        errors.into_result()
    }
}
