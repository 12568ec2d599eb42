//! Test reporters: human text, TAP version 13, and JUnit XML.
//!
//! Selected via `REPORTER`; the JUnit document goes to `JUNIT_FILE` when
//! set, stdout otherwise. All user-controlled text entering the XML
//! document is escaped.

use super::Outcome;
use std::io::{self, Write};

/// Output format for a finished suite.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reporter {
    Text,
    Tap,
    Junit,
}

impl Reporter {
    /// Read `REPORTER`; unknown values fall back to `text`.
    pub fn from_env() -> Reporter {
        match std::env::var("REPORTER").as_deref() {
            Ok("tap") => Reporter::Tap,
            Ok("junit") => Reporter::Junit,
            _ => Reporter::Text,
        }
    }

    /// Emit to stdout, or to `JUNIT_FILE` for the JUnit reporter when the
    /// variable is set.
    pub fn emit_to_env(&self, suite: &str, outcomes: &[Outcome]) {
        if *self == Reporter::Junit {
            if let Ok(path) = std::env::var("JUNIT_FILE") {
                if !path.is_empty() {
                    match std::fs::File::create(&path) {
                        Ok(mut file) => {
                            let _ = self.emit(suite, outcomes, &mut file);
                            return;
                        }
                        Err(e) => {
                            eprintln!("cannot open JUNIT_FILE {path}: {e}; writing to stdout");
                        }
                    }
                }
            }
        }
        let stdout = io::stdout();
        let mut lock = stdout.lock();
        let _ = self.emit(suite, outcomes, &mut lock);
    }

    /// Render the suite into `out`.
    pub fn emit(
        &self,
        suite: &str,
        outcomes: &[Outcome],
        out: &mut impl Write,
    ) -> io::Result<()> {
        match self {
            Reporter::Text => emit_text(suite, outcomes, out),
            Reporter::Tap => emit_tap(outcomes, out),
            Reporter::Junit => emit_junit(suite, outcomes, out),
        }
    }
}

fn emit_text(suite: &str, outcomes: &[Outcome], out: &mut impl Write) -> io::Result<()> {
    let mut failed = 0usize;
    let mut skipped = 0usize;
    for o in outcomes {
        let label = if o.skipped {
            skipped += 1;
            "SKIP"
        } else if o.failed() {
            failed += 1;
            "FAIL"
        } else {
            "PASS"
        };
        writeln!(
            out,
            "{label} {name} ({ms:.1} ms)",
            name = o.name,
            ms = o.duration_ns as f64 / 1e6
        )?;
        if o.failed() && !o.log.is_empty() {
            for line in o.log.lines() {
                writeln!(out, "    {line}")?;
            }
        }
    }
    writeln!(
        out,
        "{suite}: {passed} passed, {failed} failed, {skipped} skipped",
        passed = outcomes.len() - failed - skipped,
    )
}

fn emit_tap(outcomes: &[Outcome], out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "TAP version 13")?;
    writeln!(out, "1..{}", outcomes.len())?;
    for (i, o) in outcomes.iter().enumerate() {
        let index = i + 1;
        if o.skipped {
            writeln!(out, "ok {index} - {} # SKIP", o.name)?;
            continue;
        }
        if !o.failed() {
            writeln!(out, "ok {index} - {}", o.name)?;
            continue;
        }
        writeln!(out, "not ok {index} - {}", o.name)?;
        writeln!(out, "  ---")?;
        writeln!(out, "  errors: {}", o.errors)?;
        writeln!(out, "  panicked: {}", o.panicked)?;
        if !o.log.is_empty() {
            writeln!(out, "  log: |")?;
            for line in o.log.lines() {
                writeln!(out, "    {line}")?;
            }
        }
        writeln!(out, "  ...")?;
    }
    Ok(())
}

fn emit_junit(suite: &str, outcomes: &[Outcome], out: &mut impl Write) -> io::Result<()> {
    let failures = outcomes.iter().filter(|o| o.failed()).count();
    let skipped = outcomes.iter().filter(|o| o.skipped).count();
    let total_ns: u64 = outcomes.iter().map(|o| o.duration_ns).sum();

    writeln!(out, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
    writeln!(
        out,
        r#"<testsuite name="{}" tests="{}" failures="{}" skipped="{}" time="{:.3}">"#,
        xml_escape(suite),
        outcomes.len(),
        failures,
        skipped,
        total_ns as f64 / 1e9
    )?;
    for o in outcomes {
        write!(
            out,
            r#"  <testcase name="{}" time="{:.3}""#,
            xml_escape(&o.name),
            o.duration_ns as f64 / 1e9
        )?;
        if o.skipped {
            writeln!(out, ">")?;
            writeln!(out, "    <skipped/>")?;
            writeln!(out, "  </testcase>")?;
        } else if o.failed() {
            writeln!(out, ">")?;
            let message = if o.panicked {
                "test panicked".to_string()
            } else {
                format!("{} failed checks", o.errors)
            };
            writeln!(
                out,
                r#"    <failure message="{}">{}</failure>"#,
                xml_escape(&message),
                xml_escape(&o.log)
            )?;
            writeln!(out, "  </testcase>")?;
        } else {
            writeln!(out, "/>")?;
        }
    }
    writeln!(out, "</testsuite>")
}

/// Escape text for XML attribute and element content.
pub fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_outcomes() -> Vec<Outcome> {
        vec![
            Outcome {
                name: "alpha".into(),
                errors: 0,
                skipped: false,
                panicked: false,
                log: String::new(),
                duration_ns: 1_500_000,
            },
            Outcome {
                name: "beta <x>".into(),
                errors: 2,
                skipped: false,
                panicked: false,
                log: "check failed [beta]: a & b\n".into(),
                duration_ns: 2_000_000,
            },
            Outcome {
                name: "gamma".into(),
                errors: 0,
                skipped: true,
                panicked: false,
                log: "skip: nope\n".into(),
                duration_ns: 0,
            },
        ]
    }

    #[test]
    fn test_tap_shape() {
        let mut out = Vec::new();
        emit_tap(&sample_outcomes(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "TAP version 13");
        assert_eq!(lines[1], "1..3");
        assert_eq!(lines[2], "ok 1 - alpha");
        assert_eq!(lines[3], "not ok 2 - beta <x>");
        assert!(text.contains("  log: |"));
        assert!(text.contains("ok 3 - gamma # SKIP"));
    }

    #[test]
    fn test_junit_escapes_and_counts() {
        let mut out = Vec::new();
        emit_junit("suite", &sample_outcomes(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains(r#"tests="3" failures="1" skipped="1""#));
        assert!(text.contains("beta &lt;x&gt;"));
        assert!(text.contains("a &amp; b"));
        assert!(text.contains("<skipped/>"));
        assert!(!text.contains("<x>"));
    }

    #[test]
    fn test_text_summary() {
        let mut out = Vec::new();
        emit_text("suite", &sample_outcomes(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("PASS alpha"));
        assert!(text.contains("FAIL beta <x>"));
        assert!(text.contains("SKIP gamma"));
        assert!(text.contains("suite: 1 passed, 1 failed, 1 skipped"));
    }

    #[test]
    fn test_xml_escape() {
        assert_eq!(xml_escape(r#"<a b="c">&'"#), "&lt;a b=&quot;c&quot;&gt;&amp;&apos;");
    }
}
