//! Plain-text rendering of tools and runs.
//!
//! Everything returns a `String` so the layout can be tested without a
//! terminal. Styling is applied by the caller.

use chrono::{DateTime, Utc};
use rapt_runtime::{JobRecord, JobState, PodInfo, RunSummary};
use rapt_tool::ToolDefinition;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Column-aligned text table, two spaces between columns
#[derive(Debug, Default)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn row<I, S>(&mut self, cells: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows.push(cells.into_iter().map(Into::into).collect());
    }

    pub fn render(&self) -> String {
        let columns = self.headers.len();
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate().take(columns) {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }

        let mut out = String::new();
        for line in std::iter::once(&self.headers).chain(self.rows.iter()) {
            let mut text = String::new();
            for (i, width) in widths.iter().enumerate() {
                let cell = line.get(i).map_or("", String::as_str);
                if i + 1 == columns {
                    text.push_str(cell);
                } else {
                    text.push_str(&format!("{:<width$}  ", cell, width = *width));
                }
            }
            out.push_str(text.trim_end());
            out.push('\n');
        }
        out
    }
}

fn timestamp(at: Option<DateTime<Utc>>) -> String {
    at.map(|t| t.format(TIME_FORMAT).to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Short command summary, first word plus `...` when there are more
fn command_summary(command: Option<&[String]>) -> String {
    match command {
        Some([first]) => first.clone(),
        Some([first, ..]) => format!("{}...", first),
        _ => String::new(),
    }
}

/// `rapt list` table
pub fn tools_table(tools: &[ToolDefinition]) -> String {
    let mut table = Table::new(["NAME", "IMAGE", "COMMAND", "ARGUMENTS", "CREATED"]);
    for tool in tools {
        let args = match tool.arguments.len() {
            0 => String::new(),
            1 => "1 arg".to_string(),
            n => format!("{} args", n),
        };
        table.row([
            tool.name.clone(),
            tool.image.clone(),
            command_summary(tool.command.as_deref()),
            args,
            timestamp(tool.created),
        ]);
    }
    table.render()
}

/// `rapt describe` details
pub fn tool_details(tool: &ToolDefinition) -> String {
    let mut out = String::new();
    out.push_str(&format!("Name:        {}\n", tool.name));
    out.push_str(&format!("Namespace:   {}\n", tool.namespace));
    out.push_str(&format!("Created:     {}\n", timestamp(tool.created)));
    out.push_str(&format!("Image:       {}\n", tool.image));
    if let Some(help) = &tool.help {
        out.push_str(&format!("Help:        {}\n", help));
    }
    match &tool.command {
        Some(command) => out.push_str(&format!("Command:     {}\n", command.join(" "))),
        None => out.push_str("Command:     (image entrypoint)\n"),
    }

    if !tool.arguments.is_empty() {
        out.push_str("\nArguments:\n");
        let mut table = Table::new(["NAME", "DESCRIPTION", "REQUIRED", "DEFAULT"]);
        for arg in &tool.arguments {
            table.row([
                arg.name.clone(),
                arg.description.clone(),
                if arg.required { "Yes" } else { "No" }.to_string(),
                arg.default.clone().unwrap_or_else(|| "-".to_string()),
            ]);
        }
        out.push_str(&table.render());
    }

    if !tool.env.is_empty() {
        out.push_str("\nEnvironment Variables:\n");
        let mut table = Table::new(["NAME", "VALUE"]);
        for (name, value) in &tool.env {
            table.row([name.clone(), value.clone()]);
        }
        out.push_str(&table.render());
    }
    out
}

/// `rapt logs <tool>` table, newest first
pub fn runs_table(runs: &[RunSummary]) -> String {
    let mut table = Table::new(["JOB NAME", "STATUS", "CREATED", "DURATION"]);
    for run in runs {
        table.row([
            run.job.to_string(),
            run.state.to_string(),
            timestamp(run.created),
            run.duration_display(),
        ]);
    }
    table.render()
}

/// Header printed before the logs of one job
pub fn log_header(record: &JobRecord, pod: &PodInfo, follow: bool) -> String {
    let mut out = String::new();
    out.push_str(&format!("Job:     {}\n", record.handle.name));
    out.push_str(&format!("Pod:     {}\n", pod.name));
    out.push_str(&format!("Status:  {}\n", record.state()));
    out.push_str(&format!("Created: {}\n", timestamp(record.created)));
    if follow {
        out.push_str("Following logs (Ctrl+C to stop, the job keeps running)\n");
    }
    out.push_str(&"=".repeat(50));
    out.push('\n');
    out
}

/// Closing line for a finished wait
pub fn completion_line(job: &str, state: JobState) -> String {
    match state {
        JobState::Succeeded => format!("Job '{}' completed successfully", job),
        JobState::Failed => format!("Job '{}' failed", job),
        other => format!("Job '{}' is {}", job, other),
    }
}
