//! Exercise schema registry.
//!
//! Maps each [`ExerciseType`] to the structural rules the validator enforces
//! and the comparison mode the grader applies. The table is static and total
//! over the closed type set.

use serde::Serialize;

use crate::model::ExerciseType;

/// Minimum number of options for option-bearing exercise types.
pub const MIN_OPTIONS: usize = 2;

/// Inclusive range of points an exercise may award.
pub const POINTS_RANGE: std::ops::RangeInclusive<i64> = 1..=100;

/// The only answers a true-false exercise may store.
pub const BOOLEAN_ANSWERS: [&str; 2] = ["true", "false"];

/// Whether an exercise type carries selectable options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionsRule {
    /// Options are required, at least `min` of them.
    Required {
        /// Minimum option count.
        min: usize,
    },
    /// Options must be empty or absent.
    Forbidden,
}

/// How many correct answers a well-formed exercise stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerArity {
    /// One or more answers.
    AtLeastOne,
    /// Exactly one answer; more than one is reported as a soft warning only.
    ExactlyOneSoft,
    /// Exactly one answer, enforced as part of the answer domain.
    ExactlyOne,
}

/// Where correct answers must come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerDomain {
    /// Every answer equals some `options[].value`.
    FromOptions,
    /// The answer is the literal `"true"` or `"false"`.
    BooleanLiteral,
    /// The first answer is non-blank free text; the rest are alternatives.
    FreeText,
}

/// How the grader compares a submission with the correct answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GradingMode {
    /// Submitted and correct sets must be identical.
    SetEquality,
    /// The single submitted value must match any accepted answer.
    AnyOf,
}

/// Structural constraints for one exercise type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeRules {
    /// The exercise type these rules describe.
    pub kind: ExerciseType,
    /// Option presence and cardinality.
    pub options: OptionsRule,
    /// Answer count rule.
    pub arity: AnswerArity,
    /// Answer value rule.
    pub domain: AnswerDomain,
    /// Grading comparison.
    pub grading: GradingMode,
}

impl TypeRules {
    /// Returns `true` if this type carries options.
    #[must_use]
    pub const fn has_options(&self) -> bool {
        matches!(self.options, OptionsRule::Required { .. })
    }

    /// Returns the minimum option count, or 0 when options are forbidden.
    #[must_use]
    pub const fn min_options(&self) -> usize {
        match self.options {
            OptionsRule::Required { min } => min,
            OptionsRule::Forbidden => 0,
        }
    }
}

const MULTIPLE_CHOICE: TypeRules = TypeRules {
    kind: ExerciseType::MultipleChoice,
    options: OptionsRule::Required { min: MIN_OPTIONS },
    arity: AnswerArity::AtLeastOne,
    domain: AnswerDomain::FromOptions,
    grading: GradingMode::SetEquality,
};

const SINGLE_CHOICE: TypeRules = TypeRules {
    kind: ExerciseType::SingleChoice,
    options: OptionsRule::Required { min: MIN_OPTIONS },
    arity: AnswerArity::ExactlyOneSoft,
    domain: AnswerDomain::FromOptions,
    grading: GradingMode::AnyOf,
};

const FILL_IN_THE_BLANK: TypeRules = TypeRules {
    kind: ExerciseType::FillInTheBlank,
    options: OptionsRule::Required { min: MIN_OPTIONS },
    arity: AnswerArity::AtLeastOne,
    domain: AnswerDomain::FromOptions,
    grading: GradingMode::AnyOf,
};

const TRUE_FALSE: TypeRules = TypeRules {
    kind: ExerciseType::TrueFalse,
    options: OptionsRule::Forbidden,
    arity: AnswerArity::ExactlyOne,
    domain: AnswerDomain::BooleanLiteral,
    grading: GradingMode::AnyOf,
};

const TRANSLATION: TypeRules = TypeRules {
    kind: ExerciseType::Translation,
    options: OptionsRule::Forbidden,
    arity: AnswerArity::AtLeastOne,
    domain: AnswerDomain::FreeText,
    grading: GradingMode::AnyOf,
};

/// Returns the rules for an exercise type.
#[must_use]
pub const fn rules_for(kind: ExerciseType) -> &'static TypeRules {
    match kind {
        ExerciseType::MultipleChoice => &MULTIPLE_CHOICE,
        ExerciseType::SingleChoice => &SINGLE_CHOICE,
        ExerciseType::FillInTheBlank => &FILL_IN_THE_BLANK,
        ExerciseType::TrueFalse => &TRUE_FALSE,
        ExerciseType::Translation => &TRANSLATION,
    }
}
