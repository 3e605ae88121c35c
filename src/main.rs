use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Local;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use attendkiosk::error::AttendanceError;
use attendkiosk::models::visit::{Mood, Purpose, SleepLevel};
use attendkiosk::models::DirectoryCache;
use attendkiosk::services::ledger::{LedgerClient, SurveyQuestion};
use attendkiosk::services::reconciler::{self, ScanOutcome};
use attendkiosk::services::{aggregator, cohort, reports};
use attendkiosk::utils::config;

fn settings_path() -> PathBuf {
    PathBuf::from("settings.json")
}

#[tokio::main]
async fn main() -> Result<()> {
    config::load_dotenv();
    env_logger::init();

    let settings = config::load_settings(&settings_path());
    let client = LedgerClient::new(&settings)?;
    let directory = DirectoryCache::new();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        None => run_kiosk(&client, &directory).await,
        Some("report") => {
            let (student_id, year, month) = parse_report_args(&args[1..])?;
            let aggregate =
                aggregator::monthly_report(&client, &directory, &student_id, year, month).await?;
            let path =
                reports::write_aggregate_json(Path::new(&settings.reports_dir), &aggregate)?;
            println!(
                "{}: {} visits, avg stay {} min -> {}",
                aggregate.student_name,
                aggregate.attendance_count,
                aggregate.average_stay_minutes,
                path.display()
            );
            Ok(())
        }
        Some("cohort") => {
            let (year, month) = parse_cohort_args(&args[1..])?;
            let students = cohort::monthly_cohort(&client, &directory, year, month).await?;
            for student in &students {
                println!("{}\t{}", student.id, student.name);
            }
            println!("{} students attended in {year}-{month:02}", students.len());
            Ok(())
        }
        Some(other) => {
            bail!("unknown command: {other} (expected no command, 'report', or 'cohort')")
        }
    }
}

fn parse_report_args(args: &[String]) -> Result<(String, i32, u32)> {
    let [student_id, year, month] = args else {
        bail!("usage: attendkiosk report <student_id> <year> <month>");
    };
    Ok((
        student_id.clone(),
        year.parse().context("year must be a number")?,
        month.parse().context("month must be 1-12")?,
    ))
}

fn parse_cohort_args(args: &[String]) -> Result<(i32, u32)> {
    let [year, month] = args else {
        bail!("usage: attendkiosk cohort <year> <month>");
    };
    Ok((
        year.parse().context("year must be a number")?,
        month.parse().context("month must be 1-12")?,
    ))
}

/// Scan loop: each line on stdin is one card/QR scan. A check-in continues
/// into the three survey prompts; a second scan of the same id checks the
/// student out.
async fn run_kiosk(client: &LedgerClient, directory: &DirectoryCache) -> Result<()> {
    println!("Scan a student id ('reload' clears the directory cache, Ctrl-D quits):");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let student_id = line.trim();
        if student_id.is_empty() {
            continue;
        }
        if student_id == "reload" {
            directory.invalidate().await;
            println!("student directory cache cleared");
            continue;
        }

        let now = Local::now().naive_local();
        match reconciler::process_scan(client, directory, student_id, now).await {
            Ok(ScanOutcome::CheckedIn { row, student_name }) => {
                println!("checked in: {student_name} (row {row})");
                run_survey(client, row, &mut lines).await?;
            }
            Ok(ScanOutcome::CheckedOut { row, student_name }) => {
                println!("checked out: {student_name} (row {row})");
            }
            Err(AttendanceError::UnknownStudent(id)) => {
                println!("{id} is not registered");
            }
            Err(err) => {
                log::error!("scan for {student_id} failed: {err}");
                println!("could not record the scan: {err}");
            }
        }
    }
    Ok(())
}

async fn run_survey(
    client: &LedgerClient,
    row: u32,
    lines: &mut Lines<BufReader<Stdin>>,
) -> Result<()> {
    let moods = Mood::ALL.map(|m| m.as_str());
    let sleep_levels = SleepLevel::ALL.map(|l| l.as_str());
    let purposes = Purpose::ALL.map(|p| p.as_str());

    ask(client, row, SurveyQuestion::Mood, "Q1. 今日の気分は？", &moods, lines).await?;
    ask(
        client,
        row,
        SurveyQuestion::Sleep,
        "Q2. 昨日の睡眠の満足度は？",
        &sleep_levels,
        lines,
    )
    .await?;
    ask(
        client,
        row,
        SurveyQuestion::Purpose,
        "Q3. 今日の目的は？",
        &purposes,
        lines,
    )
    .await
}

/// Ask one survey question. Writes are never auto-retried; on failure the
/// question is asked again and the student decides whether to answer.
async fn ask(
    client: &LedgerClient,
    row: u32,
    question: SurveyQuestion,
    prompt: &str,
    choices: &[&str],
    lines: &mut Lines<BufReader<Stdin>>,
) -> Result<()> {
    loop {
        println!("{prompt}");
        for (index, choice) in choices.iter().enumerate() {
            println!("  {}: {choice}", index + 1);
        }
        println!("  (enter to skip)");

        let Some(line) = lines.next_line().await? else {
            return Ok(());
        };
        let input = line.trim();
        if input.is_empty() {
            // Skipped answers leave the cell empty.
            return Ok(());
        }
        let choice = input
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|index| choices.get(index));
        let Some(value) = choice else {
            println!("pick 1-{} or press enter to skip", choices.len());
            continue;
        };

        match client.write_survey_answer(row, question, value).await {
            Ok(()) => return Ok(()),
            Err(err) => {
                log::error!("survey write failed for row {row}: {err}");
                println!("could not save the answer ({err}); try again");
            }
        }
    }
}
