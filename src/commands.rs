use anyhow::{Context, Result};
use std::sync::Arc;

use forgeissues::comment::Comment;
use forgeissues::issue::Issue;
use forgeissues::project::Project;
use forgeissues::types::{CommentFilter, IssueListFilter, IssueStatus, NewIssue};

fn print_issue_line(issue: &Issue) {
    println!("  #{:<5} [{}] {} ({})", issue.index(), issue.status(), issue.title(), issue.author());
}

fn print_comment(comment: &Comment) {
    println!(
        "--- comment {} by {} at {}",
        comment.id(),
        comment.author(),
        comment.created().to_rfc3339()
    );
    println!("{}\n", comment.body());
}

fn non_empty(values: Vec<String>) -> Option<Vec<String>> {
    if values.is_empty() {
        None
    } else {
        Some(values)
    }
}

/// Execute the list command
pub async fn list(
    project: &Arc<Project>,
    state: IssueStatus,
    author: Option<String>,
    assignee: Option<String>,
    labels: Vec<String>,
) -> Result<()> {
    let filter = IssueListFilter {
        status: state,
        author,
        assignee,
        labels: non_empty(labels),
    };
    let issues = project
        .get_issue_list(filter)
        .await
        .context("Failed to list issues")?;

    println!("Issues in {} ({}):\n", project, issues.len());
    for issue in &issues {
        print_issue_line(issue);
    }

    Ok(())
}

/// Execute the show command
pub async fn show(project: &Arc<Project>, index: u64) -> Result<()> {
    let issue = project.get_issue(index).await?;
    let labels = issue.labels().await?;

    println!("#{} {}", issue.index(), issue.title());
    println!("Status:    {}", issue.status());
    println!("Author:    {}", issue.author());
    println!("Created:   {}", issue.created().to_rfc3339());
    println!("URL:       {}", issue.url());
    println!(
        "Labels:    {}",
        labels.iter().map(|l| l.name.as_str()).collect::<Vec<_>>().join(", ")
    );
    println!(
        "Assignees: {}",
        issue
            .assignees()
            .iter()
            .map(|a| a.login.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("\n{}", issue.description());

    Ok(())
}

/// Execute the create command
pub async fn create(
    project: &Arc<Project>,
    title: String,
    body: String,
    labels: Vec<String>,
    assignees: Vec<String>,
    private: bool,
) -> Result<()> {
    let new = NewIssue {
        title,
        body,
        private: private.then_some(true),
        labels: non_empty(labels),
        assignees: non_empty(assignees),
    };
    let issue = project
        .create_issue(new)
        .await
        .context("Failed to create issue")?;

    println!("Created issue #{}: {}", issue.index(), issue.title());
    if !issue.url().is_empty() {
        println!("{}", issue.url());
    }

    Ok(())
}

/// Execute the close command
pub async fn close(project: &Arc<Project>, index: u64) -> Result<()> {
    let mut issue = project.get_issue(index).await?;
    let issue = issue.close().await?;
    println!("Issue #{} is now {}", issue.index(), issue.status());
    Ok(())
}

/// Execute the edit command
pub async fn edit(
    project: &Arc<Project>,
    index: u64,
    title: Option<String>,
    body: Option<String>,
) -> Result<()> {
    if title.is_none() && body.is_none() {
        anyhow::bail!("Nothing to change. Pass --title and/or --body");
    }

    let mut issue = project.get_issue(index).await?;
    if let Some(title) = title {
        issue.set_title(&title).await?;
    }
    if let Some(body) = body {
        issue.set_description(&body).await?;
    }

    println!("Updated issue #{}: {}", issue.index(), issue.title());
    Ok(())
}

/// Execute the label command
pub async fn label(project: &Arc<Project>, index: u64, names: Vec<String>) -> Result<()> {
    let mut issue = project.get_issue(index).await?;
    issue.add_label(names).await?;

    let labels = issue.labels().await?;
    println!(
        "Issue #{} labels: {}",
        issue.index(),
        labels.iter().map(|l| l.name.as_str()).collect::<Vec<_>>().join(", ")
    );
    Ok(())
}

/// Execute the assign command
pub async fn assign(project: &Arc<Project>, index: u64, logins: Vec<String>) -> Result<()> {
    let mut issue = project.get_issue(index).await?;
    issue.add_assignee(logins).await?;

    println!(
        "Issue #{} assignees: {}",
        issue.index(),
        issue
            .assignees()
            .iter()
            .map(|a| a.login.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok(())
}

/// Execute the comment command
pub async fn comment(project: &Arc<Project>, index: u64, body: &str) -> Result<()> {
    let issue = project.get_issue(index).await?;
    let comment = issue.comment(body).await?;
    println!("Added comment {} to issue #{}", comment.id(), issue.index());
    Ok(())
}

/// Execute the comments command
pub async fn comments(project: &Arc<Project>, index: u64, filter: CommentFilter) -> Result<()> {
    let issue = project.get_issue(index).await?;
    let comments = issue.get_comments(filter).await?;

    println!("#{} {} ({} comments)\n", issue.index(), issue.title(), comments.len());
    for comment in &comments {
        print_comment(comment);
    }

    Ok(())
}
