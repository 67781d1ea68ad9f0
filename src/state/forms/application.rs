//! The Uptick mentorship programme application form

use super::definition::{FormDefinition, StepSpec};
use super::field::FieldSpec;
use super::validation::{CrossCheck, Rule, RuleSpec};

/// Storage key of the autosaved application draft
pub const DRAFT_KEY: &str = "uptick_application_draft";

/// Item that enables the free-text "other" companions
pub const OTHER: &str = "OTHER";

const EMAIL_PATTERN: &str = r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$";
const PHONE_PATTERN: &str = r"^\+?[0-9][0-9 ()-]{6,19}$";
const URL_PATTERN: &str = r"^https?://[^\s/$.?#][^\s]*$";
const GITHUB_PATTERN: &str = r"^https?://(www\.)?github\.com/[A-Za-z0-9_-]+/?$";

const GENDERS: &[&str] = &["FEMALE", "MALE", "NON_BINARY", "PREFER_NOT_TO_SAY"];
const TRACKS: &[&str] = &["FRONTEND", "BACKEND", "PRODUCT_DESIGN"];
const FRONTEND_TOOLS: &[&str] = &["REACT", "NEXTJS", "VUE", "ANGULAR", "SVELTE", OTHER];
const BACKEND_TOOLS: &[&str] = &["NODE_EXPRESS", "DJANGO", "LARAVEL", "SPRING", "GO", OTHER];
const DESIGN_TOOLS: &[&str] = &["FIGMA", "ADOBE_XD", "SKETCH", "FRAMER", OTHER];
const EXPERIENCE_LEVELS: &[&str] = &["BEGINNER", "INTERMEDIATE", "ADVANCED"];
const REFERRAL_SOURCES: &[&str] = &[
    "TWITTER",
    "LINKEDIN",
    "INSTAGRAM",
    "FRIEND",
    "UPTICK_ALUMNI",
    "OTHER",
];

fn required(message: &str) -> RuleSpec {
    RuleSpec::new(Rule::Required, message)
}

fn pattern(pattern: &str, message: &str) -> RuleSpec {
    RuleSpec::new(
        Rule::Pattern {
            pattern: pattern.to_string(),
        },
        message,
    )
}

fn one_of(options: &[&str], message: &str) -> RuleSpec {
    RuleSpec::new(
        Rule::OneOf {
            options: options.iter().map(|o| o.to_string()).collect(),
        },
        message,
    )
}

fn min_length(min: usize, message: &str) -> RuleSpec {
    RuleSpec::new(Rule::MinLength { min }, message)
}

fn max_length(max: usize, message: &str) -> RuleSpec {
    RuleSpec::new(Rule::MaxLength { max }, message)
}

fn range(min: i64, max: i64, message: &str) -> RuleSpec {
    RuleSpec::new(
        Rule::Range {
            min: Some(min),
            max: Some(max),
        },
        message,
    )
}

fn required_for_track(track: &str, message: &str) -> RuleSpec {
    RuleSpec::new(
        Rule::CrossField {
            check: CrossCheck::RequiredWhenEquals {
                field: "track".to_string(),
                value: track.to_string(),
            },
        },
        message,
    )
}

fn required_with_other(list: &str, message: &str) -> RuleSpec {
    RuleSpec::new(
        Rule::CrossField {
            check: CrossCheck::RequiredWhenContains {
                field: list.to_string(),
                item: OTHER.to_string(),
            },
        },
        message,
    )
}

/// The five-step application: personal details, track, experience,
/// motivation, review & consent
pub fn uptick_application() -> FormDefinition {
    let fields = vec![
        FieldSpec::text("firstName", "First name"),
        FieldSpec::text("lastName", "Last name"),
        FieldSpec::text("email", "Email address"),
        FieldSpec::text("confirmEmail", "Confirm email address").ui_only(),
        FieldSpec::text("phoneNumber", "Phone number"),
        FieldSpec::choice("gender", "Gender", GENDERS),
        FieldSpec::date("dateOfBirth", "Date of birth"),
        FieldSpec::text("location", "City / country"),
        FieldSpec::choice("track", "Track", TRACKS),
        FieldSpec::list("frontendTools", "Frontend tools you have used", FRONTEND_TOOLS),
        FieldSpec::text("frontendToolsOther", "Other frontend tools")
            .companion_of("frontendTools", OTHER),
        FieldSpec::list("backendTools", "Backend tools you have used", BACKEND_TOOLS),
        FieldSpec::text("backendToolsOther", "Other backend tools")
            .companion_of("backendTools", OTHER),
        FieldSpec::list("designTools", "Design tools you have used", DESIGN_TOOLS),
        FieldSpec::text("designToolsOther", "Other design tools")
            .companion_of("designTools", OTHER),
        FieldSpec::choice("experienceLevel", "Experience level", EXPERIENCE_LEVELS),
        FieldSpec::number("yearsOfExperience", "Years of experience"),
        FieldSpec::text("githubUrl", "GitHub profile"),
        FieldSpec::text("portfolioUrl", "Portfolio link"),
        FieldSpec::text("motivation", "Why do you want to join Uptick?"),
        FieldSpec::number("hoursPerWeek", "Hours available per week"),
        FieldSpec::choice("referralSource", "How did you hear about us?", REFERRAL_SOURCES),
        FieldSpec::flag("agreeToTerms", "I agree to the programme terms"),
        FieldSpec::flag("newsletterOptIn", "Send me programme updates"),
        FieldSpec::flag("reviewConfirmed", "I confirm my answers are accurate").ui_only(),
    ];

    let steps = vec![
        StepSpec::new("Personal details")
            .field(
                "firstName",
                vec![
                    required("First name is required"),
                    min_length(2, "First name must be at least 2 characters"),
                ],
            )
            .field(
                "lastName",
                vec![
                    required("Last name is required"),
                    min_length(2, "Last name must be at least 2 characters"),
                ],
            )
            .field(
                "email",
                vec![
                    required("Email is required"),
                    pattern(EMAIL_PATTERN, "Enter a valid email address"),
                ],
            )
            .field(
                "confirmEmail",
                vec![
                    required("Please confirm your email"),
                    RuleSpec::new(
                        Rule::CrossField {
                            check: CrossCheck::MatchesField {
                                field: "email".to_string(),
                            },
                        },
                        "Email addresses do not match",
                    ),
                ],
            )
            .field(
                "phoneNumber",
                vec![
                    required("Phone number is required"),
                    pattern(PHONE_PATTERN, "Enter a valid phone number"),
                ],
            )
            .field(
                "gender",
                vec![
                    required("Please select a gender option"),
                    one_of(GENDERS, "Please select a gender option"),
                ],
            )
            .field("dateOfBirth", vec![required("Date of birth is required")])
            .field(
                "location",
                vec![max_length(100, "Location must be at most 100 characters")],
            ),
        StepSpec::new("Track")
            .field(
                "track",
                vec![
                    required("Please select a track"),
                    one_of(TRACKS, "Please select a valid track"),
                ],
            )
            .field(
                "frontendTools",
                vec![
                    required_for_track("FRONTEND", "Select at least one frontend tool"),
                    one_of(FRONTEND_TOOLS, "Unknown frontend tool selected"),
                ],
            )
            .field(
                "frontendToolsOther",
                vec![
                    required_with_other("frontendTools", "Tell us which other frontend tools"),
                    max_length(100, "Keep this under 100 characters"),
                ],
            )
            .field(
                "backendTools",
                vec![
                    required_for_track("BACKEND", "Select at least one backend tool"),
                    one_of(BACKEND_TOOLS, "Unknown backend tool selected"),
                ],
            )
            .field(
                "backendToolsOther",
                vec![
                    required_with_other("backendTools", "Tell us which other backend tools"),
                    max_length(100, "Keep this under 100 characters"),
                ],
            )
            .field(
                "designTools",
                vec![
                    required_for_track("PRODUCT_DESIGN", "Select at least one design tool"),
                    one_of(DESIGN_TOOLS, "Unknown design tool selected"),
                ],
            )
            .field(
                "designToolsOther",
                vec![
                    required_with_other("designTools", "Tell us which other design tools"),
                    max_length(100, "Keep this under 100 characters"),
                ],
            ),
        StepSpec::new("Experience")
            .field(
                "experienceLevel",
                vec![
                    required("Please select your experience level"),
                    one_of(EXPERIENCE_LEVELS, "Please select a valid experience level"),
                ],
            )
            .field(
                "yearsOfExperience",
                vec![range(0, 50, "Years of experience must be between 0 and 50")],
            )
            .field(
                "githubUrl",
                vec![pattern(GITHUB_PATTERN, "Enter a valid GitHub profile URL")],
            )
            .field(
                "portfolioUrl",
                vec![pattern(URL_PATTERN, "Enter a valid URL")],
            ),
        StepSpec::new("Motivation")
            .field(
                "motivation",
                vec![
                    required("Tell us why you want to join"),
                    min_length(50, "Please write at least 50 characters"),
                    max_length(1000, "Please keep it under 1000 characters"),
                ],
            )
            .field(
                "hoursPerWeek",
                vec![
                    required("Let us know your weekly availability"),
                    range(5, 60, "Availability must be between 5 and 60 hours"),
                ],
            )
            .field(
                "referralSource",
                vec![
                    required("Tell us how you heard about us"),
                    one_of(REFERRAL_SOURCES, "Please select a valid option"),
                ],
            ),
        StepSpec::new("Review & consent")
            .field(
                "agreeToTerms",
                vec![required("You must accept the programme terms")],
            )
            .field("newsletterOptIn", vec![])
            .field(
                "reviewConfirmed",
                vec![required("Please confirm your answers are accurate")],
            ),
    ];

    FormDefinition {
        name: "uptick-application".to_string(),
        fields,
        steps,
    }
}
