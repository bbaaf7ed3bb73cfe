//! Console rendering of a [`Dashboard`].
use std::io::{self, Write};

use crate::aggregate::Dashboard;

const HEADER_FORMAT: &str = "%Y-%m-%d %H:%M";

pub fn write_text<W: Write>(out: &mut W, dashboard: &Dashboard) -> io::Result<()> {
    let w = &dashboard.window;
    writeln!(
        out,
        "[INFO] Looking for upcoming assignments between {} and {} UTC",
        w.now.format(HEADER_FORMAT),
        w.upcoming_end.format(HEADER_FORMAT)
    )?;
    writeln!(
        out,
        "[INFO] Looking for missing assignments between {} and {} UTC",
        w.missing_start.format(HEADER_FORMAT),
        w.now.format(HEADER_FORMAT)
    )?;

    for course in &dashboard.courses {
        writeln!(out)?;
        writeln!(out, "=== {} ===", course.name)?;
        writeln!(out, "Upcoming Assignments (Next 7 Days):")?;
        for line in &course.upcoming {
            writeln!(out, "- {}", line)?;
        }
        writeln!(out, "Missing Assignments (Past Due, Last 2 Weeks):")?;
        for line in &course.missing {
            writeln!(out, "- {}", line)?;
        }
    }
    Ok(())
}

pub fn write_json<W: Write>(out: &mut W, dashboard: &Dashboard) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, dashboard)?;
    writeln!(out)
}
