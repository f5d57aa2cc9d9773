use std::borrow::Cow;

/// Provider identifier - mostly static constants ("STOOQ", "YAHOO", ...)
pub type ProviderId = Cow<'static, str>;
