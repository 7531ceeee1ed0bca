//! Course store command-line runner.
//!
//! # Responsibility
//! - Connect to the configured store and run the course walkthrough:
//!   create, list a page, update both ways, remove.
//! - Print each result as JSON on stdout; diagnostics go to the logger.
//!
//! # Invariants
//! - A failed connection is logged and ends the process with a non-zero
//!   status; it is never retried.

use course_core::{
    connect, init_console_logging, init_logging, AppConfig, CourseError, CourseFilter,
    CourseInput, CoursePatch, CourseRepository, DocumentStore, Page,
};
use log::{error, info};
use serde::Serialize;
use std::process::ExitCode;

fn main() -> ExitCode {
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("course_cli: {err}");
            return ExitCode::FAILURE;
        }
    };

    let logging = match config.log_dir.as_deref() {
        Some(dir) => init_logging(&config.log_level, dir),
        None => init_console_logging(&config.log_level),
    };
    if let Err(err) = logging {
        eprintln!("course_cli: {err}");
        return ExitCode::FAILURE;
    }

    let store = match connect(&config.database_uri, &config.store) {
        Ok(store) => store,
        Err(err) => {
            error!("event=cli_connect module=cli status=error error={err}");
            return ExitCode::FAILURE;
        }
    };
    info!("event=cli_connect module=cli status=ok");

    let repo = CourseRepository::new(&store);
    let outcome = run_walkthrough(&repo);
    drop(repo);

    if let Err(err) = store.close() {
        error!("event=cli_close module=cli status=error error={err}");
    }

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_walkthrough module=cli status=error error={err}");
            ExitCode::FAILURE
        }
    }
}

fn run_walkthrough<S: DocumentStore>(repo: &CourseRepository<S>) -> Result<(), CourseError> {
    let draft = CourseInput {
        name: Some("Angular Course".to_string()),
        category: Some("web".to_string()),
        author: Some("Mosh".to_string()),
        tags: vec!["angular".to_string(), "frontend".to_string()],
        is_published: Some(true),
        price: Some(15.0),
        ..CourseInput::default()
    };

    match repo.create(&CourseInput::default()) {
        Err(CourseError::Validation(err)) => {
            for field in err.errors() {
                print_json("validation_error", field.message.as_str());
            }
        }
        other => {
            other?;
        }
    }

    let course = repo.create(&draft)?;
    print_json("created", &course);

    let filter = CourseFilter {
        author: Some("Mosh".to_string()),
        is_published: Some(true),
    };
    for number in [1, 2] {
        let page = repo.list(&filter, Page::new(number, 10))?;
        print_json(&format!("page_{number}"), &page);
    }

    let replaced = repo.update_by_replace(
        course.id,
        &CoursePatch {
            is_published: Some(true),
            author: Some("Another Author".to_string()),
            ..CoursePatch::default()
        },
    )?;
    print_json("updated_by_replace", &replaced);

    let direct = repo.update_direct(
        course.id,
        &CoursePatch {
            is_published: Some(false),
            author: Some("Jason".to_string()),
            ..CoursePatch::default()
        },
    )?;
    print_json("updated_direct", &direct);

    let removed = repo.remove(course.id)?;
    print_json("removed", &removed);

    match repo.remove(course.id) {
        Err(CourseError::NotFound(id)) => print_json("already_removed", &id),
        other => {
            other?;
        }
    }

    Ok(())
}

fn print_json<T: Serialize + ?Sized>(label: &str, value: &T) {
    match serde_json::to_string(value) {
        Ok(json) => println!("{label} {json}"),
        Err(err) => error!("event=cli_print module=cli status=error label={label} error={err}"),
    }
}
