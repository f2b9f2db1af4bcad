// MIST Gateway - Git Tools
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Local repository operations through the git binary (`git -C {repo} ...`).
// Interactive credential prompts are disabled: pull/push fail instead of
// blocking the server on stdin.

use crate::error::{ToolError, ToolResult};
use std::path::{Path, PathBuf};
use std::process::Command;

const FIELD_SEP: char = '\u{1f}';
const RECORD_SEP: char = '\u{1e}';

/// One entry of `git log`
#[derive(Debug, Clone, PartialEq)]
pub struct CommitInfo {
    pub hash: String,
    pub short_hash: String,
    pub author: String,
    pub date: String,
    pub message: String,
}

/// Parse `git log --format=%H%x1f%an <%ae>%x1f%aI%x1f%B%x1e`
pub fn parse_log(output: &str) -> Vec<CommitInfo> {
    output
        .split(RECORD_SEP)
        .filter_map(|record| {
            let record = record.trim_start_matches('\n');
            if record.trim().is_empty() {
                return None;
            }
            let mut fields = record.splitn(4, FIELD_SEP);
            let hash = fields.next()?.trim().to_string();
            let author = fields.next()?.to_string();
            let date = fields.next()?.to_string();
            let message = fields.next().unwrap_or_default().trim().to_string();
            Some(CommitInfo {
                short_hash: hash.chars().take(7).collect(),
                hash,
                author,
                date,
                message,
            })
        })
        .collect()
}

/// Values that git would read as an option
fn reject_option(name: &str, value: &str) -> Result<(), ToolError> {
    if value.starts_with('-') {
        return Err(ToolError::invalid(name, format!("'{}' must not start with '-'", value)));
    }
    Ok(())
}

/// Runs the configured git binary
pub struct Git {
    binary: String,
}

impl Git {
    pub fn new(binary: impl Into<String>) -> Self {
        Self { binary: binary.into() }
    }

    fn command(&self, repo: &Path, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("-C").arg(repo).args(args).env("GIT_TERMINAL_PROMPT", "0");
        cmd
    }

    fn spawn_error(&self, subcommand: &str, e: std::io::Error) -> ToolError {
        ToolError::Git {
            command: subcommand.to_string(),
            message: format!("could not run {}: {}", self.binary, e),
        }
    }

    /// Run and return stdout. A non-zero exit becomes ToolError::Git with stderr.
    fn run(&self, repo: &Path, args: &[&str]) -> Result<String, ToolError> {
        let (stdout, _) = self.run_both(repo, args)?;
        Ok(stdout)
    }

    /// Run and return (stdout, stderr); push and pull report on stderr
    fn run_both(&self, repo: &Path, args: &[&str]) -> Result<(String, String), ToolError> {
        let subcommand = args.first().copied().unwrap_or_default().to_string();
        log::debug!("git -C {:?} {}", repo, args.join(" "));
        let output = self.command(repo, args).output().map_err(|e| self.spawn_error(&subcommand, e))?;
        let stdout = String::from_utf8_lossy(&output.stdout).trim_end().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if !output.status.success() {
            let message = if stderr.is_empty() { stdout } else { stderr };
            return Err(ToolError::Git { command: subcommand, message });
        }
        Ok((stdout, stderr))
    }

    /// Resolve and check a repository path
    pub fn open(&self, repo_path: &str) -> Result<PathBuf, ToolError> {
        let path = crate::paths::expand_home(repo_path);
        if !path.exists() {
            return Err(ToolError::not_found(format!("No such path: {}", repo_path)));
        }
        let output = self
            .command(&path, &["rev-parse", "--is-inside-work-tree"])
            .output()
            .map_err(|e| self.spawn_error("rev-parse", e))?;
        if output.status.success() && String::from_utf8_lossy(&output.stdout).trim() == "true" {
            Ok(path)
        } else {
            Err(ToolError::message(format!("Not a git repository: {}", repo_path)))
        }
    }

    fn has_commits(&self, repo: &Path) -> bool {
        self.run(repo, &["rev-parse", "--verify", "--quiet", "HEAD"]).is_ok()
    }

    // ====== git_status ======

    pub fn status(&self, repo_path: &str) -> ToolResult {
        let repo = self.open(repo_path)?;
        let out = self.run(&repo, &["status"])?;
        Ok(format!("Repository status for {}:\n\n{}", repo_path, out))
    }

    // ====== git_diff_unstaged ======

    pub fn diff_unstaged(&self, repo_path: &str) -> ToolResult {
        let repo = self.open(repo_path)?;
        let diff = self.run(&repo, &["diff"])?;
        if diff.trim().is_empty() {
            return Ok("No unstaged changes.".to_string());
        }
        Ok(format!("Unstaged changes in {}:\n\n{}", repo_path, diff))
    }

    // ====== git_diff_staged ======

    pub fn diff_staged(&self, repo_path: &str) -> ToolResult {
        let repo = self.open(repo_path)?;
        let diff = self.run(&repo, &["diff", "--cached"])?;
        if diff.trim().is_empty() {
            return Ok("No staged changes.".to_string());
        }
        Ok(format!("Staged changes in {}:\n\n{}", repo_path, diff))
    }

    // ====== git_diff ======

    pub fn diff(&self, repo_path: &str, target: &str) -> ToolResult {
        reject_option("target", target)?;
        let repo = self.open(repo_path)?;
        let diff = self.run(&repo, &["diff", target])?;
        if diff.trim().is_empty() {
            return Ok(format!("No differences between current HEAD and {}.", target));
        }
        Ok(format!("Diff with {} in {}:\n\n{}", target, repo_path, diff))
    }

    // ====== git_commit ======

    pub fn commit(&self, repo_path: &str, message: &str) -> ToolResult {
        let repo = self.open(repo_path)?;
        self.run(&repo, &["commit", "-m", message])?;
        let sha = self.run(&repo, &["rev-parse", "HEAD"])?;
        log::info!("Committed {} in {}", sha.trim(), repo_path);
        Ok(format!("Changes committed successfully with hash {}", sha.trim()))
    }

    // ====== git_add ======

    pub fn add(&self, repo_path: &str, files: &[String]) -> ToolResult {
        let repo = self.open(repo_path)?;
        let missing: Vec<&str> = files
            .iter()
            .filter(|f| !repo.join(f.as_str()).exists())
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(ToolError::message(format!(
                "The following files do not exist: {}",
                missing.join(", ")
            )));
        }
        let mut args = vec!["add", "--"];
        args.extend(files.iter().map(String::as_str));
        self.run(&repo, &args)?;
        Ok(format!("Files staged successfully: {}", files.join(", ")))
    }

    // ====== git_reset ======

    pub fn reset(&self, repo_path: &str) -> ToolResult {
        let repo = self.open(repo_path)?;
        if self.has_commits(&repo) {
            self.run(&repo, &["reset", "--quiet"])?;
        } else {
            // Unborn branch: nothing to reset to, unstage everything
            self.run(&repo, &["rm", "-r", "--cached", "--quiet", "--ignore-unmatch", "."])?;
        }
        Ok("All staged changes reset".to_string())
    }

    // ====== git_log ======

    pub fn log(&self, repo_path: &str, max_count: u64) -> ToolResult {
        let repo = self.open(repo_path)?;
        if !self.has_commits(&repo) {
            return Ok("No commits found.".to_string());
        }
        let count = max_count.to_string();
        let out = self.run(
            &repo,
            &["log", "-n", &count, "--format=%H%x1f%an <%ae>%x1f%aI%x1f%B%x1e"],
        )?;
        let commits = parse_log(&out);
        if commits.is_empty() {
            return Ok("No commits found.".to_string());
        }
        let mut result = format!(
            "Commit history for {} (showing {} commits):\n\n",
            repo_path,
            commits.len()
        );
        for c in &commits {
            result.push_str(&format!(
                "Commit: {} ({})\nAuthor: {}\nDate: {}\nMessage: {}\n\n",
                c.short_hash, c.hash, c.author, c.date, c.message
            ));
        }
        Ok(result)
    }

    // ====== git_create_branch ======

    pub fn create_branch(&self, repo_path: &str, branch_name: &str, base_branch: Option<&str>) -> ToolResult {
        reject_option("branch_name", branch_name)?;
        let repo = self.open(repo_path)?;
        let base = match base_branch {
            Some(b) => {
                reject_option("base_branch", b)?;
                b.to_string()
            }
            None => self.run(&repo, &["rev-parse", "--abbrev-ref", "HEAD"])?.trim().to_string(),
        };
        self.run(&repo, &["branch", branch_name, &base])?;
        Ok(format!("Created branch '{}' from '{}'", branch_name, base))
    }

    // ====== git_checkout ======

    pub fn checkout(&self, repo_path: &str, branch_name: &str) -> ToolResult {
        reject_option("branch_name", branch_name)?;
        let repo = self.open(repo_path)?;
        self.run(&repo, &["checkout", branch_name])?;
        Ok(format!("Switched to branch '{}'", branch_name))
    }

    // ====== git_show ======

    pub fn show(&self, repo_path: &str, revision: &str) -> ToolResult {
        reject_option("revision", revision)?;
        let repo = self.open(repo_path)?;
        let out = self.run(&repo, &["show", "--format=fuller", revision])?;
        Ok(format!("Details for revision {} in {}:\n\n{}", revision, repo_path, out))
    }

    // ====== git_init ======

    pub fn init(&self, repo_path: &str) -> ToolResult {
        let path = crate::paths::expand_home(repo_path);
        std::fs::create_dir_all(&path)?;
        let out = self.run(&path, &["init"])?;
        log::info!("Initialized repository at {:?}", path);
        Ok(out.trim().to_string())
    }

    // ====== git_branch_list ======

    pub fn branch_list(&self, repo_path: &str) -> ToolResult {
        let repo = self.open(repo_path)?;
        let out = self.run(
            &repo,
            &[
                "for-each-ref",
                "--format=%(HEAD)%1f%(refname:short)%1f%(objectname:short)%1f%(contents:subject)",
                "refs/heads",
            ],
        )?;
        let mut lines = Vec::new();
        for line in out.lines().filter(|l| !l.trim().is_empty()) {
            let fields: Vec<&str> = line.splitn(4, FIELD_SEP).collect();
            if fields.len() < 4 {
                continue;
            }
            let marker = if fields[0] == "*" { "* " } else { "  " };
            lines.push(format!("{}{} - {} - {}", marker, fields[1], fields[2], fields[3]));
        }
        if lines.is_empty() {
            return Ok("No branches found.".to_string());
        }
        Ok(format!("Branches in {}:\n\n{}\n", repo_path, lines.join("\n")))
    }

    // ====== git_remote_list ======

    pub fn remote_list(&self, repo_path: &str) -> ToolResult {
        let repo = self.open(repo_path)?;
        let out = self.run(&repo, &["remote", "-v"])?;
        let mut remotes: Vec<String> = Vec::new();
        for line in out.lines() {
            // "origin\thttps://host/repo.git (fetch)"
            let mut parts = line.split_whitespace();
            if let (Some(name), Some(url)) = (parts.next(), parts.next()) {
                let entry = format!("{} - {}", name, url);
                if !remotes.iter().any(|r| r.starts_with(&format!("{} - ", name))) {
                    remotes.push(entry);
                }
            }
        }
        if remotes.is_empty() {
            return Ok("No remotes found.".to_string());
        }
        Ok(format!("Remotes in {}:\n\n{}\n", repo_path, remotes.join("\n")))
    }

    // ====== git_stash_list ======

    pub fn stash_list(&self, repo_path: &str) -> ToolResult {
        let repo = self.open(repo_path)?;
        let out = self.run(&repo, &["stash", "list"])?;
        let stashes: Vec<&str> = out.lines().filter(|l| !l.trim().is_empty()).collect();
        if stashes.is_empty() {
            return Ok("No stashes found.".to_string());
        }
        Ok(format!("Stashes in {}:\n\n{}\n", repo_path, stashes.join("\n")))
    }

    // ====== git_remote_add ======

    pub fn remote_add(&self, repo_path: &str, name: &str, url: &str) -> ToolResult {
        reject_option("name", name)?;
        reject_option("url", url)?;
        let repo = self.open(repo_path)?;
        self.run(&repo, &["remote", "add", name, url])?;
        Ok(format!("Added remote '{}' with URL '{}'", name, url))
    }

    // ====== git_pull / git_push ======

    fn sync(&self, verb: &str, repo_path: &str, remote: &str, branch: Option<&str>) -> Result<String, ToolError> {
        reject_option("remote", remote)?;
        if let Some(b) = branch {
            reject_option("branch", b)?;
        }
        let repo = self.open(repo_path)?;
        let mut args = vec![verb, remote];
        args.extend(branch);
        let (stdout, stderr) = self.run_both(&repo, &args)?;
        Ok([stdout, stderr]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n"))
    }

    pub fn pull(&self, repo_path: &str, remote: &str, branch: Option<&str>) -> ToolResult {
        let out = self.sync("pull", repo_path, remote, branch)?;
        let target = branch.map_or_else(|| remote.to_string(), |b| format!("{}/{}", remote, b));
        Ok(format!("Pulled from {}:\n\n{}", target, out))
    }

    pub fn push(&self, repo_path: &str, remote: &str, branch: Option<&str>) -> ToolResult {
        let out = self.sync("push", repo_path, remote, branch)?;
        let target = branch.map_or_else(|| remote.to_string(), |b| format!("{}/{}", remote, b));
        log::info!("Pushed {} to {}", repo_path, target);
        Ok(format!("Pushed to {}:\n\n{}", target, out))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn git_available() -> bool {
        Command::new("git").arg("--version").output().map(|o| o.status.success()).unwrap_or(false)
    }

    /// Fresh repo with a local identity and no signing
    fn init_repo(dir: &Path) -> Git {
        let git = Git::new("git");
        git.init(dir.to_str().unwrap()).unwrap();
        for (k, v) in [
            ("user.name", "Test User"),
            ("user.email", "test@example.com"),
            ("commit.gpgsign", "false"),
        ] {
            git.run(dir, &["config", k, v]).unwrap();
        }
        git
    }

    #[test]
    fn missing_binary_is_reported_on_open() {
        let dir = tempdir().unwrap();
        let git = Git::new("/nonexistent/mist-git");
        let err = git.open(dir.path().to_str().unwrap()).unwrap_err();
        assert!(matches!(err, ToolError::Git { .. }));
        let text = err.to_string();
        assert!(text.contains("could not run /nonexistent/mist-git"), "{}", text);
        assert!(!text.contains("Not a git repository"));
    }

    #[test]
    fn log_output_parses() {
        let raw = "abc1234def\u{1f}Ada <ada@example.com>\u{1f}2024-06-03T10:00:00+00:00\u{1f}First line\n\nBody\n\u{1e}\n\
                   0123456789\u{1f}Bob <bob@example.com>\u{1f}2024-06-02T10:00:00+00:00\u{1f}Second\n\u{1e}";
        let commits = parse_log(raw);
        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].short_hash, "abc1234");
        assert_eq!(commits[0].message, "First line\n\nBody");
        assert_eq!(commits[1].author, "Bob <bob@example.com>");
        assert!(parse_log("").is_empty());
    }

    #[test]
    fn option_like_values_are_rejected() {
        assert!(reject_option("revision", "--output=/tmp/x").is_err());
        assert!(reject_option("revision", "HEAD~1").is_ok());
    }

    #[test]
    fn missing_path_and_non_repo() {
        if !git_available() {
            return;
        }
        let git = Git::new("git");
        let err = git.status("/definitely/not/here").unwrap_err();
        assert_eq!(err.to_tool_text(), "Error: No such path: /definitely/not/here");

        let dir = tempdir().unwrap();
        let plain = dir.path().join("plain");
        std::fs::create_dir(&plain).unwrap();
        let err = git.status(plain.to_str().unwrap()).unwrap_err();
        assert!(err.to_string().starts_with("Not a git repository: "));
    }

    #[test]
    fn add_commit_log_round() {
        if !git_available() {
            return;
        }
        let dir = tempdir().unwrap();
        let git = init_repo(dir.path());
        let repo = dir.path().to_str().unwrap();

        assert_eq!(git.log(repo, 10).unwrap(), "No commits found.");
        assert_eq!(git.diff_staged(repo).unwrap(), "No staged changes.");

        std::fs::write(dir.path().join("a.txt"), "hello\n").unwrap();
        let err = git.add(repo, &["a.txt".to_string(), "nope.txt".to_string()]).unwrap_err();
        assert_eq!(err.to_tool_text(), "Error: The following files do not exist: nope.txt");

        assert_eq!(git.add(repo, &["a.txt".to_string()]).unwrap(), "Files staged successfully: a.txt");
        assert!(git.diff_staged(repo).unwrap().contains("+hello"));

        let msg = git.commit(repo, "Add a").unwrap();
        assert!(msg.starts_with("Changes committed successfully with hash "));

        let log = git.log(repo, 5).unwrap();
        assert!(log.contains("(showing 1 commits)"));
        assert!(log.contains("Author: Test User <test@example.com>"));
        assert!(log.contains("Message: Add a"));

        std::fs::write(dir.path().join("a.txt"), "changed\n").unwrap();
        assert!(git.diff_unstaged(repo).unwrap().contains("+changed"));
        assert_eq!(
            git.diff(repo, "HEAD").unwrap().lines().next().unwrap(),
            format!("Diff with HEAD in {}:", repo)
        );
    }

    #[test]
    fn branches_and_checkout() {
        if !git_available() {
            return;
        }
        let dir = tempdir().unwrap();
        let git = init_repo(dir.path());
        let repo = dir.path().to_str().unwrap();
        std::fs::write(dir.path().join("f"), "x").unwrap();
        git.add(repo, &["f".to_string()]).unwrap();
        git.commit(repo, "init").unwrap();

        let created = git.create_branch(repo, "feature", None).unwrap();
        assert!(created.starts_with("Created branch 'feature' from '"));
        assert_eq!(git.checkout(repo, "feature").unwrap(), "Switched to branch 'feature'");

        let list = git.branch_list(repo).unwrap();
        assert!(list.contains("* feature - "));
        assert!(list.contains(" - init"));

        assert_eq!(git.remote_list(repo).unwrap(), "No remotes found.");
        git.remote_add(repo, "origin", "https://example.com/repo.git").unwrap();
        assert!(git.remote_list(repo).unwrap().contains("origin - https://example.com/repo.git"));
        assert_eq!(git.stash_list(repo).unwrap(), "No stashes found.");

        let shown = git.show(repo, "HEAD").unwrap();
        assert!(shown.contains("init"));
    }

    #[test]
    fn reset_unstages() {
        if !git_available() {
            return;
        }
        let dir = tempdir().unwrap();
        let git = init_repo(dir.path());
        let repo = dir.path().to_str().unwrap();
        std::fs::write(dir.path().join("f"), "x").unwrap();
        git.add(repo, &["f".to_string()]).unwrap();
        assert_eq!(git.reset(repo).unwrap(), "All staged changes reset");
        assert_eq!(git.diff_staged(repo).unwrap(), "No staged changes.");
    }
}
