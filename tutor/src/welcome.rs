//! Locally synthesized assistant texts: the welcome greeting and the
//! diagnostics appended when an ask fails.

use crate::gateway::FailureKind;
use crate::prefs::{LanguageMode, Preferences};

const WELCOME_ARABIC: &str = "مرحباً {name}! أنا مساعدك لتعلم اللغة العربية. كيف بقدر اساعدك اليوم؟";
const WELCOME_HEBREW: &str = "שלום {name}! אני העוזר שלך ללימוד השפה הערבית. איך אני יכול לעזור לך היום?";
const WELCOME_ENGLISH: &str = "Hello {name}! I'm your assistant for learning Arabic. How can I help you today?";

pub const AUTH_DIAGNOSTIC: &str = "I'm having trouble authenticating your session. Please try logging in again or refreshing the page. If this error persists, check that your session hasn't expired.";

const LIMIT_HEBREW: &str = "הגעת למגבלת ההודעות החינמיות להיום. שדרג לחשבון פרימיום להודעות ללא הגבלה ותכונות נוספות. לחץ על הכפתור למטה כדי לשדרג ולהמשיך את מסע הלמידה שלך בערבית ללא הפרעות.";
const LIMIT_ARABIC: &str = "وصلت للحد الأقصى من الرسائل المجانية. قم بالترقية إلى الحساب المميز لرسائل غير محدودة وميزات إضافية.";
const LIMIT_ENGLISH: &str = "You've reached the free message limit. Upgrade to a premium account for unlimited messages and extra features, and continue your Arabic learning journey without interruption.";

const GENERIC_HEBREW: &str = "לא הצלחתי לקבל תשובה כרגע. נסה לשלוח את ההודעה שוב בעוד רגע.";
const GENERIC_ARABIC: &str = "ما قدرت أجيب رد هلأ. جرب تبعت الرسالة مرة تانية بعد شوي.";
const GENERIC_ENGLISH: &str = "I couldn't get a response right now. Please try sending your message again in a moment.";

/// Greeting shown as the first assistant message of a fresh conversation.
#[must_use]
pub fn welcome_message(prefs: &Preferences) -> String {
    let template = match prefs.language {
        LanguageMode::Arabic => WELCOME_ARABIC,
        LanguageMode::Hebrew => WELCOME_HEBREW,
        LanguageMode::EnglishTransliteration => WELCOME_ENGLISH,
    };
    template.replace("{name}", prefs.display_name.trim())
}

/// Text appended in place of an answer when a send is refused for quota.
#[must_use]
pub fn limit_message(language: LanguageMode) -> &'static str {
    match language {
        LanguageMode::Arabic => LIMIT_ARABIC,
        LanguageMode::Hebrew => LIMIT_HEBREW,
        LanguageMode::EnglishTransliteration => LIMIT_ENGLISH,
    }
}

/// The single diagnostic appended for a failed ask.
#[must_use]
pub fn diagnostic_message(kind: FailureKind, language: LanguageMode) -> &'static str {
    match kind {
        FailureKind::Authentication => AUTH_DIAGNOSTIC,
        FailureKind::Quota => limit_message(language),
        FailureKind::Generic => match language {
            LanguageMode::Arabic => GENERIC_ARABIC,
            LanguageMode::Hebrew => GENERIC_HEBREW,
            LanguageMode::EnglishTransliteration => GENERIC_ENGLISH,
        },
    }
}

/// Body of the "limit approaching" notice.
#[must_use]
pub fn remaining_hint(remaining: u32) -> String {
    let plural = if remaining == 1 { "" } else { "s" };
    format!("You have {remaining} message{plural} left. Consider upgrading to premium for unlimited messages.")
}

#[cfg(test)]
#[path = "welcome_test.rs"]
mod tests;
