use std::fs::File;

use time::{format_description, OffsetDateTime};
use tracing::{subscriber::set_global_default, Level};
use tracing_subscriber::{fmt::writer::BoxMakeWriter, FmtSubscriber};

/// Send all tracing output to a timestamped `arena_*.log` file in the
/// working directory. Panics if the file cannot be created or a global
/// subscriber is already installed.
pub(crate) fn init_logger() {
    let name_format =
        format_description::parse("arena_[year][month][day]-[hour][minute][second].log").unwrap();
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    let file_name = now.format(&name_format).unwrap();
    let file = File::create(&file_name)
        .unwrap_or_else(|e| panic!("could not create log file {file_name}: {e}"));

    let offset = time::UtcOffset::current_local_offset().unwrap_or(time::UtcOffset::UTC);
    let timer = tracing_subscriber::fmt::time::OffsetTime::new(
        offset,
        format_description::parse("[year]-[month]-[day] [hour]:[minute]:[second]").unwrap(),
    );

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::TRACE)
        .with_ansi(false)
        .with_timer(timer)
        .with_writer(BoxMakeWriter::new(file))
        .finish();

    set_global_default(subscriber).expect(
        "could not set the global tracing subscriber; disable file logging if you already set one",
    );
}
