//! User interface settings, a single remote resource.

use super::SyncContext;
use super::remote_id;
use anyhow::{Context as _, Result};
use declarative::{
    Attr, Choices, Fallback, Kind, Lookups, Raw, Summary, decode, normalize, top, update_attrs,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const PATH: &str = "/api/v1/config/ui";

const FIRST_DAY_OF_WEEK: Choices = &[("sunday", Raw::Int(0)), ("monday", Raw::Int(1))];

const WEEK_COLUMN_HEADER: Choices = &[
    ("month-first", Raw::Str("ddd M/D")),
    ("month-first-padded", Raw::Str("ddd MM/DD")),
    ("day-first", Raw::Str("ddd D/M")),
    ("day-first-padded", Raw::Str("ddd DD/MM")),
];

const SHORT_DATE_FORMAT: Choices = &[
    ("word-month-first", Raw::Str("MMM D YYYY")),
    ("word-month-second", Raw::Str("DD MMM YYYY")),
    ("slash-month-first", Raw::Str("MM/D/YYYY")),
    ("slash-month-first-day-padded", Raw::Str("MM/DD/YYYY")),
    ("slash-day-first", Raw::Str("DD/MM/YYYY")),
    ("iso8601", Raw::Str("YYYY-MM-DD")),
];

const LONG_DATE_FORMAT: Choices = &[
    ("month-first", Raw::Str("dddd, MMMM D YYYY")),
    ("day-first", Raw::Str("dddd, D MMMM YYYY")),
];

const TIME_FORMAT: Choices = &[
    ("twelve-hour", Raw::Str("h(:mm)a")),
    ("twentyfour-hour", Raw::Str("HH:mm")),
];

const THEME: Choices = &[
    ("auto", Raw::Str("auto")),
    ("light", Raw::Str("light")),
    ("dark", Raw::Str("dark")),
];

pub(crate) const ATTRS: &[Attr] = &[
    top(
        "first_day_of_week",
        "firstDayOfWeek",
        Kind::Choice(FIRST_DAY_OF_WEEK),
        Fallback::Str("sunday"),
    ),
    top(
        "week_column_header",
        "calendarWeekColumnHeader",
        Kind::Choice(WEEK_COLUMN_HEADER),
        Fallback::Str("month-first"),
    ),
    top(
        "short_date_format",
        "shortDateFormat",
        Kind::Choice(SHORT_DATE_FORMAT),
        Fallback::Str("word-month-first"),
    ),
    top(
        "long_date_format",
        "longDateFormat",
        Kind::Choice(LONG_DATE_FORMAT),
        Fallback::Str("month-first"),
    ),
    top(
        "time_format",
        "timeFormat",
        Kind::Choice(TIME_FORMAT),
        Fallback::Str("twelve-hour"),
    ),
    top(
        "show_relative_dates",
        "showRelativeDates",
        Kind::Bool,
        Fallback::Bool(true),
    ),
    top(
        "enable_color_impaired_mode",
        "enableColorImpairedMode",
        Kind::Bool,
        Fallback::Bool(false),
    ),
    top("theme", "theme", Kind::Choice(THEME), Fallback::Str("light")),
    top("ui_language", "uiLanguage", Kind::Str, Fallback::Str("en")),
];

/// UI settings as an attribute table. Unset attributes take their local
/// defaults, so an empty table resets the instance to them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UiSettings(pub Map<String, Value>);

impl UiSettings {
    pub fn validate(&mut self, tree: &str) -> declarative::Result<()> {
        self.0 = normalize(ATTRS, &self.0, tree, &[])?;
        Ok(())
    }
}

pub fn from_remote(ctx: &SyncContext<'_>) -> Result<UiSettings> {
    let remote = ctx.client.get(PATH)?;
    Ok(UiSettings(decode(ATTRS, &remote, &Lookups::new())?))
}

/// Send every attribute when any of them changed.
pub fn update_remote(ctx: &SyncContext<'_>, tree: &str, local: &UiSettings) -> Result<Summary> {
    let object = ctx.client.get(PATH)?;
    let remote = decode(ATTRS, &object, &Lookups::new())
        .with_context(|| format!("Unable to read {tree}"))?;
    let mut summary = Summary::default();
    let (changed, changes) = update_attrs(tree, ATTRS, &local.0, &remote, &Lookups::new(), true)?;
    if changed {
        let id = remote_id(&object)?;
        let mut body = Map::new();
        body.insert("id".to_string(), Value::from(id));
        body.extend(changes.attrs);
        ctx.client.put(&format!("{PATH}/{id}"), Value::Object(body))?;
    }
    summary.add_update(changed);
    Ok(summary)
}
