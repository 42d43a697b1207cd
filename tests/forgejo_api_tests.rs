use forgeissues::backend::forgejo::ForgejoApi;
use forgeissues::{
    ApiError, ForgeApi, IssueError, IssueListFilter, IssueStatus, NewIssue, Service,
};
use forgeissues::types::{IssueEdit, ListCriteria};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn issue_json(number: u64, title: &str, state: &str) -> Value {
    json!({
        "id": 5000 + number,
        "number": number,
        "title": title,
        "body": "Issue body",
        "url": format!("https://forge.test/api/v1/repos/owner/repo/issues/{number}"),
        "html_url": format!("https://forge.test/owner/repo/issues/{number}"),
        "user": { "id": 1, "login": "owner" },
        "created_at": "2024-05-01T10:00:00Z",
        "updated_at": "2024-05-02T10:00:00Z",
        "state": state,
        "assignees": null,
        "labels": []
    })
}

fn comment_json(id: u64, body: &str) -> Value {
    json!({
        "id": id,
        "body": body,
        "user": { "id": 1, "login": "owner" },
        "created_at": "2024-05-01T10:00:00Z",
        "updated_at": "2024-05-03T10:00:00Z"
    })
}

async fn mount_repo(server: &MockServer, has_issues: bool) {
    Mock::given(method("GET"))
        .and(path("/api/v1/repos/owner/repo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 1,
            "full_name": "owner/repo",
            "has_issues": has_issues
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_sends_token_and_decodes_issue() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/repos/owner/repo/issues/3"))
        .and(header("authorization", "token secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(issue_json(3, "Crash", "open")))
        .expect(1)
        .mount(&server)
        .await;

    let api = ForgejoApi::new(&server.uri(), Some("secret")).unwrap();
    let raw = api.issue_get("owner", "repo", 3).await.unwrap();

    assert_eq!(raw.number, 3);
    assert_eq!(raw.id, 5003);
    assert_eq!(raw.title, "Crash");
    assert_eq!(raw.user.login, "owner");
}

#[tokio::test]
async fn test_error_message_is_extracted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/repos/owner/repo/issues"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "message": "user does not exist [uid: 0, name: ghost]",
            "url": "https://forge.test/api/swagger"
        })))
        .mount(&server)
        .await;

    let api = ForgejoApi::new(&server.uri(), None).unwrap();
    let criteria = ListCriteria {
        state: "open".to_string(),
        created_by: Some("ghost".to_string()),
        ..Default::default()
    };
    let err = api.issue_list("owner", "repo", &criteria).await.unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(err.message(), "user does not exist [uid: 0, name: ghost]");
}

#[tokio::test]
async fn test_list_sends_issue_only_criteria() {
    let server = MockServer::start().await;
    mount_repo(&server, true).await;
    Mock::given(method("GET"))
        .and(path("/api/v1/repos/owner/repo/issues"))
        .and(query_param("state", "all"))
        .and(query_param("type", "issues"))
        .and(query_param("assigned_by", "owner"))
        .and(query_param("labels", "bug,ui"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            issue_json(2, "second", "closed"),
            issue_json(1, "first", "open")
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let service = Service::forgejo(&server.uri(), None).unwrap();
    let project = service.project("owner", "repo");
    let issues = project
        .get_issue_list(IssueListFilter {
            status: IssueStatus::All,
            assignee: Some("owner".to_string()),
            labels: Some(vec!["bug".to_string(), "ui".to_string()]),
            ..Default::default()
        })
        .await
        .unwrap();

    let indexes: Vec<u64> = issues.iter().map(|i| i.index()).collect();
    assert_eq!(indexes, vec![2, 1]);
    assert_eq!(issues[0].status(), IssueStatus::Closed);
}

#[tokio::test]
async fn test_unknown_user_lists_nothing() {
    let server = MockServer::start().await;
    mount_repo(&server, true).await;
    Mock::given(method("GET"))
        .and(path("/api/v1/repos/owner/repo/issues"))
        .and(query_param("created_by", "xyzidontexist"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "message": "user does not exist [uid: 0, name: xyzidontexist]"
        })))
        .mount(&server)
        .await;

    let project = Service::forgejo(&server.uri(), None)
        .unwrap()
        .project("owner", "repo");
    let issues = project
        .get_issue_list(IssueListFilter {
            author: Some("xyzidontexist".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

    assert!(issues.is_empty());
}

#[tokio::test]
async fn test_other_not_found_fails_listing() {
    let server = MockServer::start().await;
    mount_repo(&server, true).await;
    Mock::given(method("GET"))
        .and(path("/api/v1/repos/owner/repo/issues"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "message": "repository does not exist"
        })))
        .mount(&server)
        .await;

    let project = Service::forgejo(&server.uri(), None)
        .unwrap()
        .project("owner", "repo");
    let err = project
        .get_issue_list(IssueListFilter::default())
        .await
        .unwrap_err();

    assert!(matches!(err, IssueError::OperationNotSupported { .. }));
}

#[tokio::test]
async fn test_unknown_state_is_rejected() {
    let server = MockServer::start().await;
    mount_repo(&server, true).await;
    Mock::given(method("GET"))
        .and(path("/api/v1/repos/owner/repo/issues/9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(issue_json(9, "odd", "merged")))
        .mount(&server)
        .await;

    let project = Service::forgejo(&server.uri(), None)
        .unwrap()
        .project("owner", "repo");
    let err = project.get_issue(9).await.unwrap_err();

    assert!(matches!(err, IssueError::UnknownStatus(s) if s == "merged"));
}

#[tokio::test]
async fn test_close_edits_then_refetches() {
    let server = MockServer::start().await;
    mount_repo(&server, true).await;
    Mock::given(method("GET"))
        .and(path("/api/v1/repos/owner/repo/issues/4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(issue_json(4, "Close me", "open")))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/api/v1/repos/owner/repo/issues/4"))
        .and(body_json(json!({ "state": "closed" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(issue_json(4, "Close me", "closed")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/repos/owner/repo/issues/4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(issue_json(4, "Close me", "closed")))
        .mount(&server)
        .await;

    let project = Service::forgejo(&server.uri(), None)
        .unwrap()
        .project("owner", "repo");
    let mut issue = project.get_issue(4).await.unwrap();
    assert_eq!(issue.status(), IssueStatus::Open);

    issue.close().await.unwrap();
    assert_eq!(issue.status(), IssueStatus::Closed);
}

#[tokio::test]
async fn test_add_label_posts_delta() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/repos/owner/repo/issues/1/labels"))
        .and(body_json(json!({ "labels": ["a", "b"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 1, "name": "a" },
            { "id": 2, "name": "b" }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let api = ForgejoApi::new(&server.uri(), None).unwrap();
    api.issue_add_label("owner", "repo", 1, &["a".to_string(), "b".to_string()])
        .await
        .unwrap();
}

#[tokio::test]
async fn test_edit_sends_only_set_fields() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/api/v1/repos/owner/repo/issues/1"))
        .and(body_json(json!({ "assignees": ["owner", "alice"] })))
        .respond_with(ResponseTemplate::new(201).set_body_json(issue_json(1, "t", "open")))
        .expect(1)
        .mount(&server)
        .await;

    let api = ForgejoApi::new(&server.uri(), None).unwrap();
    let edit = IssueEdit {
        assignees: Some(vec!["owner".to_string(), "alice".to_string()]),
        ..Default::default()
    };
    api.issue_edit("owner", "repo", 1, &edit).await.unwrap();
}

#[tokio::test]
async fn test_comment_endpoints() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/repos/owner/repo/issues/comments/1794"))
        .respond_with(ResponseTemplate::new(200).set_body_json(comment_json(1794, "test comment")))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/api/v1/repos/owner/repo/issues/comments/1794"))
        .and(body_json(json!({ "body": "edited" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(comment_json(1794, "edited")))
        .mount(&server)
        .await;

    let api = ForgejoApi::new(&server.uri(), None).unwrap();
    let comment = api.issue_get_comment("owner", "repo", 1794).await.unwrap();
    assert_eq!(comment.body, "test comment");

    let edited = api
        .issue_edit_comment("owner", "repo", 1794, "edited")
        .await
        .unwrap();
    assert_eq!(edited.body, "edited");
}

#[tokio::test]
async fn test_server_error_maps_to_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/repos/owner/repo"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let api = ForgejoApi::new(&server.uri(), None).unwrap();
    let err = api.repository_get("owner", "repo").await.unwrap_err();

    assert!(matches!(err, ApiError::Status { status: 503, ref message } if message == "maintenance"));
}

#[tokio::test]
async fn test_create_attaches_labels_by_name() {
    let server = MockServer::start().await;
    mount_repo(&server, true).await;
    Mock::given(method("POST"))
        .and(path("/api/v1/repos/owner/repo/issues"))
        .and(body_json(json!({ "title": "Crash", "body": "Issue body" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(issue_json(6, "Crash", "open")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/repos/owner/repo/issues/6/labels"))
        .and(body_json(json!({ "labels": ["bug"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": 1, "name": "bug" }])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/repos/owner/repo/issues/6"))
        .respond_with(ResponseTemplate::new(200).set_body_json(issue_json(6, "Crash", "open")))
        .expect(1)
        .mount(&server)
        .await;

    let project = Service::forgejo(&server.uri(), None)
        .unwrap()
        .project("owner", "repo");
    let issue = project
        .create_issue(NewIssue {
            labels: Some(vec!["bug".to_string()]),
            ..NewIssue::new("Crash", "Issue body")
        })
        .await
        .unwrap();

    assert_eq!(issue.index(), 6);
}

#[tokio::test]
async fn test_create_without_labels_is_one_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/repos/owner/repo/issues"))
        .and(body_json(json!({ "title": "Crash", "body": "Issue body" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(issue_json(6, "Crash", "open")))
        .expect(1)
        .mount(&server)
        .await;

    let api = ForgejoApi::new(&server.uri(), None).unwrap();
    let raw = api
        .issue_create("owner", "repo", "Crash", "Issue body", Some(&[] as &[String]), None)
        .await
        .unwrap();

    assert_eq!(raw.number, 6);
}

#[tokio::test]
async fn test_get_pull_request_is_not_supported() {
    let server = MockServer::start().await;
    mount_repo(&server, true).await;
    let mut pull = issue_json(8, "A fix", "open");
    pull["pull_request"] = json!({ "merged": false, "merged_at": null });
    Mock::given(method("GET"))
        .and(path("/api/v1/repos/owner/repo/issues/8"))
        .respond_with(ResponseTemplate::new(200).set_body_json(pull))
        .mount(&server)
        .await;

    let project = Service::forgejo(&server.uri(), None)
        .unwrap()
        .project("owner", "repo");
    let err = project.get_issue(8).await.unwrap_err();

    assert!(matches!(err, IssueError::OperationNotSupported { source: None, .. }));
}
