// Copyright (c) 2026 Conduit Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Hook Template Engine
//!
//! Renders the `post-receive` and `deploy` scripts installed into every bare
//! repository. Rendering is pure data substitution through Handlebars, so the
//! same parameters always produce byte-identical scripts.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Generate executable git hooks from fixed shell templates
//!
//! # Supported Placeholders
//!
//! - `{{name}}` - Repository name (last path component)
//! - `{{identity}}` - Image identity (`owner/name`)
//! - `{{repo_dir}}` - Bare repository directory
//! - `{{work_dir}}` - Work tree directory
//! - `{{git_binary}}` / `{{compose_binary}}` - External tools
//! - `{{rollover_url}}` / `{{token}}` - Rollover endpoint (rollover mode only)

use handlebars::Handlebars;
use serde::Serialize;
use thiserror::Error;

pub const POST_RECEIVE_TEMPLATE: &str = r#"#!/bin/bash
REPO_DIR="{{repo_dir}}"
/bin/bash "$REPO_DIR/hooks/deploy"
"#;

pub const DEPLOY_COMPOSE_TEMPLATE: &str = r#"#!/bin/bash
NAME="{{name}}"
REPO_DIR="{{repo_dir}}"
WORK_DIR="{{work_dir}}"

echo " --> Deploying $NAME"

unset GIT_INDEX_FILE
{{git_binary}} --work-tree="$WORK_DIR" --git-dir="$REPO_DIR" checkout -f

cd "$WORK_DIR" || exit 1

OUT=$({{compose_binary}} up -d 2>&1)
STATUS=$?

IFS=$'\n' read -rd '' -a COMPOSE_OUT <<<"$OUT"
for LINE in "${COMPOSE_OUT[@]}"; do
    echo " --> $LINE"
done

echo " --> Deploy for $NAME complete"
exit $STATUS
"#;

pub const DEPLOY_ROLLOVER_TEMPLATE: &str = r#"#!/bin/bash
NAME="{{name}}"
IDENTITY="{{identity}}"
REPO_DIR="{{repo_dir}}"
WORK_DIR="{{work_dir}}"
TOKEN="{{token}}"

echo " --> Deploying $NAME"

unset GIT_INDEX_FILE
{{git_binary}} --work-tree="$WORK_DIR" --git-dir="$REPO_DIR" checkout -f

OUT=$(curl -sS -X POST \
    -H "Content-Type: application/json" \
    -H "X-Token: $TOKEN" \
    --data "{\"repository\":{\"repo_name\":\"$IDENTITY\"}}" \
    "{{rollover_url}}" 2>&1)
STATUS=$?

IFS=$'\n' read -rd '' -a ROLLOVER_OUT <<<"$OUT"
for LINE in "${ROLLOVER_OUT[@]}"; do
    echo " --> $LINE"
done

echo " --> Deploy for $NAME complete"
exit $STATUS
"#;

const POST_RECEIVE: &str = "post-receive";
const DEPLOY_COMPOSE: &str = "deploy-compose";
const DEPLOY_ROLLOVER: &str = "deploy-rollover";

#[derive(Debug, Error)]
pub enum HookTemplateError {
    #[error("Invalid hook template: {0}")]
    Template(#[from] Box<handlebars::TemplateError>),
    #[error("Failed to render hook template: {0}")]
    Render(#[from] handlebars::RenderError),
}

/// Parameters substituted into every hook script
#[derive(Debug, Clone, Serialize)]
pub struct HookParams {
    pub name: String,
    pub identity: String,
    pub repo_dir: String,
    pub work_dir: String,
    pub git_binary: String,
    pub compose_binary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollover_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Rendered hook scripts, ready to be written to `hooks/`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedHooks {
    pub post_receive: String,
    pub deploy: String,
}

pub struct HookTemplateEngine {
    handlebars: Handlebars<'static>,
}

impl HookTemplateEngine {
    pub fn new() -> Result<Self, HookTemplateError> {
        let mut handlebars = Handlebars::new();

        // Shell scripts, not HTML; a missing parameter is a bug.
        handlebars.register_escape_fn(handlebars::no_escape);
        handlebars.set_strict_mode(true);

        handlebars
            .register_template_string(POST_RECEIVE, POST_RECEIVE_TEMPLATE)
            .map_err(Box::new)?;
        handlebars
            .register_template_string(DEPLOY_COMPOSE, DEPLOY_COMPOSE_TEMPLATE)
            .map_err(Box::new)?;
        handlebars
            .register_template_string(DEPLOY_ROLLOVER, DEPLOY_ROLLOVER_TEMPLATE)
            .map_err(Box::new)?;

        Ok(Self { handlebars })
    }

    /// Render both scripts. The deploy script posts to the rollover endpoint
    /// when one is configured, otherwise it runs the compose tool.
    pub fn render(&self, params: &HookParams) -> Result<RenderedHooks, HookTemplateError> {
        let post_receive = self.handlebars.render(POST_RECEIVE, params)?;
        let deploy_template = if params.rollover_url.is_some() {
            DEPLOY_ROLLOVER
        } else {
            DEPLOY_COMPOSE
        };
        let deploy = self.handlebars.render(deploy_template, params)?;

        Ok(RenderedHooks { post_receive, deploy })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> HookParams {
        HookParams {
            name: "app.git".to_string(),
            identity: "acme/app".to_string(),
            repo_dir: "/srv/repos/acme/app.git".to_string(),
            work_dir: "/srv/work/acme/app.git".to_string(),
            git_binary: "git".to_string(),
            compose_binary: "docker-compose".to_string(),
            rollover_url: None,
            token: None,
        }
    }

    #[test]
    fn test_post_receive_golden() {
        let engine = HookTemplateEngine::new().unwrap();
        let hooks = engine.render(&params()).unwrap();
        assert_eq!(
            hooks.post_receive,
            "#!/bin/bash\nREPO_DIR=\"/srv/repos/acme/app.git\"\n/bin/bash \"$REPO_DIR/hooks/deploy\"\n"
        );
    }

    #[test]
    fn test_compose_deploy_script() {
        let engine = HookTemplateEngine::new().unwrap();
        let deploy = engine.render(&params()).unwrap().deploy;

        assert!(deploy.starts_with("#!/bin/bash\nNAME=\"app.git\"\n"));
        assert!(deploy.contains("WORK_DIR=\"/srv/work/acme/app.git\""));
        assert!(deploy.contains("git --work-tree=\"$WORK_DIR\" --git-dir=\"$REPO_DIR\" checkout -f"));
        assert!(deploy.contains("OUT=$(docker-compose up -d 2>&1)"));
        assert!(deploy.contains("echo \" --> $LINE\""));
        assert!(deploy.contains("${COMPOSE_OUT[@]}"));
        assert!(!deploy.contains("curl"));
    }

    #[test]
    fn test_rollover_deploy_script() {
        let engine = HookTemplateEngine::new().unwrap();
        let mut p = params();
        p.rollover_url = Some("http://127.0.0.1:8080/hook".to_string());
        p.token = Some("s3cret".to_string());
        let deploy = engine.render(&p).unwrap().deploy;

        assert!(deploy.contains("TOKEN=\"s3cret\""));
        assert!(deploy.contains("\"http://127.0.0.1:8080/hook\" 2>&1)"));
        assert!(deploy.contains("{\\\"repository\\\":{\\\"repo_name\\\":\\\"$IDENTITY\\\"}}"));
        assert!(deploy.contains("IDENTITY=\"acme/app\""));
        assert!(!deploy.contains("docker-compose"));
    }

    #[test]
    fn test_rendering_is_reproducible() {
        let engine = HookTemplateEngine::new().unwrap();
        assert_eq!(engine.render(&params()).unwrap(), engine.render(&params()).unwrap());
    }

    #[test]
    fn test_values_are_not_html_escaped() {
        let engine = HookTemplateEngine::new().unwrap();
        let mut p = params();
        p.rollover_url = Some("http://host/hook?a=1&b=2".to_string());
        p.token = Some(String::new());
        let deploy = engine.render(&p).unwrap().deploy;
        assert!(deploy.contains("http://host/hook?a=1&b=2"));
    }

    #[test]
    fn test_missing_rollover_token_is_an_error() {
        let engine = HookTemplateEngine::new().unwrap();
        let mut p = params();
        p.rollover_url = Some("http://host/hook".to_string());
        assert!(matches!(engine.render(&p), Err(HookTemplateError::Render(_))));
    }
}
