//! End-to-end scenarios driven through the public bootstrap hook.
//!
//! Each test installs fresh global registries via `shell::bootstrap` under a
//! process-wide lock, then feeds raw lines to the engine exactly as the REPL
//! or a `.neuro` script would.

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use pretty_assertions::assert_eq;

use neuroshell::llm::{MockLlmClient, Provider};
use neuroshell::services;
use neuroshell::{shell, Engine, NeuroError};

static GLOBAL_LOCK: Mutex<()> = Mutex::new(());

/// Fresh shell state for one test. Hold the guard for the whole test.
fn setup() -> (MutexGuard<'static, ()>, Engine) {
    let guard = GLOBAL_LOCK.lock();
    shell::bootstrap().expect("bootstrap");
    (guard, Engine::new())
}

fn var(name: &str) -> String {
    services::variable_service()
        .unwrap()
        .get(name)
        .unwrap_or_default()
}

/// Installs a shared mock client and points `_client_id` at it.
fn install_mock_client() -> Arc<MockLlmClient> {
    let mock = Arc::new(MockLlmClient::new());
    let factory = services::client_factory_service().unwrap();
    factory.insert_client("mock:test****", Provider::Mock, mock.clone());
    services::variable_service()
        .unwrap()
        .set("_client_id", "mock:test****")
        .unwrap();
    mock
}

#[tokio::test]
async fn try_catches_failing_subcommand() {
    let (_guard, engine) = setup();

    // The error is captured, not raised to the caller.
    engine.execute("\\try \\get[nonexistent_var]").await.unwrap();

    assert_eq!(var("_status"), "1");
    assert!(var("_error").contains("nonexistent_var"));
}

#[tokio::test]
async fn try_leaves_stack_and_depths_balanced() {
    let (_guard, engine) = setup();

    engine.execute("\\try \\get[nonexistent_var]").await.unwrap();

    let stack = services::stack_service().unwrap();
    assert_eq!(stack.stack_size(), 0);
    assert!(!stack.is_in_try_block());
    assert!(!stack.is_in_silent_block());
}

#[tokio::test]
async fn nested_try_captures_inner_error_only() {
    let (_guard, engine) = setup();

    engine
        .execute("\\try \\try \\get[nonexistent_var]")
        .await
        .unwrap();

    assert_eq!(var("_status"), "1");
    let stack = services::stack_service().unwrap();
    assert_eq!(stack.current_try_depth(), 0);
}

#[tokio::test]
async fn error_outside_try_propagates_and_sets_state() {
    let (_guard, engine) = setup();

    let err = engine.execute("\\get[nonexistent_var]").await.unwrap_err();
    assert!(matches!(err, NeuroError::VariableNotFound(_)));
    assert_eq!(var("_status"), "1");
    assert!(var("_error").contains("nonexistent_var"));
}

#[tokio::test]
async fn read_only_get_preserves_error_state() {
    let (_guard, engine) = setup();

    // Fail once, then inspect the error through read-only commands.
    let _ = engine.execute("\\get[nonexistent_var]").await;
    assert_eq!(var("_status"), "1");

    engine.execute("\\get[_error]").await.unwrap();
    assert_eq!(var("_status"), "1", "read-only get must not clear _status");

    // A non-read-only command resets state again.
    engine.execute("\\set[x=1]").await.unwrap();
    assert_eq!(var("_status"), "0");
    // The pre-reset failure is still visible in the snapshots.
    assert_eq!(var("#last_status"), "1");
    assert!(var("#last_error").contains("nonexistent_var"));
}

#[tokio::test]
async fn while_loop_terminates_when_condition_turns_falsy() {
    let (_guard, engine) = setup();

    engine.execute("\\set[flag=true]").await.unwrap();
    engine
        .execute("\\while[condition=${flag}] \\set[flag=false]")
        .await
        .unwrap();

    assert_eq!(var("flag"), "false");
    assert_eq!(var("#while_result"), "false");
}

#[tokio::test]
async fn while_loop_reinterpolates_condition_each_iteration() {
    let (_guard, engine) = setup();

    // Three iterations: body rewrites the variable the condition reads.
    engine.execute("\\set[step_a=true]").await.unwrap();
    engine.execute("\\set[step_b=true]").await.unwrap();
    engine
        .execute("\\while[condition=${step_a}] \\set[step_a=${step_b}, step_b=false]")
        .await
        .unwrap();

    assert_eq!(var("step_a"), "false");
    assert_eq!(var("#while_result"), "false");
}

#[tokio::test]
async fn runaway_while_hits_iteration_guard() {
    let (_guard, engine) = setup();

    let err = engine
        .execute("\\while[condition=true] \\set[x=1]")
        .await
        .unwrap_err();
    assert!(matches!(err, NeuroError::InfiniteLoop(_)));

    // The stack is cleared after the fatal abort.
    assert_eq!(services::stack_service().unwrap().stack_size(), 0);
}

#[tokio::test]
async fn silent_suppresses_stdout_but_not_state() {
    let (_guard, engine) = setup();

    engine.execute("\\silent \\set[foo=bar]").await.unwrap();
    engine.execute("\\silent \\echo loud text").await.unwrap();

    // Nothing reached the output ring from inside silent blocks.
    assert!(engine.output_history().is_empty());

    // State changes persist.
    engine.execute("\\get[foo]").await.unwrap();
    assert_eq!(engine.output_history(), vec!["foo = bar\n".to_string()]);

    let stack = services::stack_service().unwrap();
    assert!(!stack.is_in_silent_block());
}

#[tokio::test]
async fn silent_with_empty_input_is_a_noop() {
    let (_guard, engine) = setup();
    engine.execute("\\silent").await.unwrap();
    assert_eq!(services::stack_service().unwrap().stack_size(), 0);
}

#[tokio::test]
async fn errors_inside_silent_still_propagate() {
    let (_guard, engine) = setup();

    let err = engine
        .execute("\\silent \\get[nonexistent_var]")
        .await
        .unwrap_err();
    assert!(matches!(err, NeuroError::VariableNotFound(_)));
    // The silent depth unwound with the abort.
    assert!(!services::stack_service().unwrap().is_in_silent_block());
}

#[tokio::test]
async fn if_branches_on_truthy_non_standard_value() {
    let (_guard, engine) = setup();

    engine
        .execute("\\if[condition=hello] \\set[flag=1]")
        .await
        .unwrap();

    assert_eq!(var("flag"), "1");
    assert_eq!(var("#if_result"), "true");
}

#[tokio::test]
async fn if_skips_falsy_condition() {
    let (_guard, engine) = setup();

    engine
        .execute("\\if[condition=off] \\set[flag=1]")
        .await
        .unwrap();

    assert!(services::variable_service().unwrap().get("flag").is_err());
    assert_eq!(var("#if_result"), "false");
}

#[tokio::test]
async fn if_not_inverts_the_condition() {
    let (_guard, engine) = setup();

    engine
        .execute("\\if-not[condition=0] \\set[inverted=yes]")
        .await
        .unwrap();

    assert_eq!(var("inverted"), "yes");
    assert_eq!(var("#if_not_result"), "true");
}

#[tokio::test]
async fn echo_interprets_escapes_and_stores_output_without_newline() {
    let (_guard, engine) = setup();

    engine
        .execute("\\echo[raw=false] Line1\\nLine2")
        .await
        .unwrap();

    // Stdout gained the trailing newline; _output did not.
    assert_eq!(engine.output_history(), vec!["Line1\nLine2\n".to_string()]);
    assert_eq!(var("_output"), "Line1\nLine2");
}

#[tokio::test]
async fn echo_raw_keeps_backslashes() {
    let (_guard, engine) = setup();

    engine.execute("\\echo Line1\\nLine2").await.unwrap();
    assert_eq!(var("_output"), "Line1\\nLine2");
}

#[tokio::test]
async fn set_then_get_round_trips() {
    let (_guard, engine) = setup();

    engine.execute("\\set[k=v]").await.unwrap();
    engine.execute("\\get[k]").await.unwrap();

    assert_eq!(
        engine.output_history().last().map(String::as_str),
        Some("k = v\n")
    );
}

#[tokio::test]
async fn interpolation_expands_variables_in_commands() {
    let (_guard, engine) = setup();

    engine.execute("\\set[name=world]").await.unwrap();
    engine.execute("\\echo hello ${name}").await.unwrap();

    assert_eq!(var("_output"), "hello world");
}

#[tokio::test]
async fn interpolation_of_missing_names_is_empty() {
    let (_guard, engine) = setup();

    engine.execute("\\echo [${missing_entirely}]").await.unwrap();
    assert_eq!(var("_output"), "[]");
}

#[tokio::test]
async fn user_write_to_system_namespace_fails() {
    let (_guard, engine) = setup();

    let err = engine.execute("\\set[#secret=1]").await.unwrap_err();
    assert!(matches!(err, NeuroError::InvalidVariable(_)));
    assert_eq!(var("_status"), "1");

    let err = engine.execute("\\set[_not_whitelisted=1]").await.unwrap_err();
    assert!(matches!(err, NeuroError::InvalidVariable(_)));
}

#[tokio::test]
async fn unknown_command_is_an_error() {
    let (_guard, engine) = setup();

    let err = engine.execute("\\no-such-command").await.unwrap_err();
    assert!(err.to_string().contains("no-such-command"));
    assert_eq!(var("_status"), "1");
}

#[tokio::test]
async fn quit_returns_exit_sentinel_to_the_host() {
    let (_guard, engine) = setup();

    let err = engine.execute("\\quit").await.unwrap_err();
    assert!(matches!(err, NeuroError::Exit));
}

#[tokio::test]
async fn echo_command_mode_prefixes_commands() {
    let (_guard, engine) = setup();

    // _echo_command is re-read after each command; the flag takes effect on
    // the next line. The prefix goes to the real stdout, not the capture, so
    // this only checks the variable plumbing is accepted.
    engine.execute("\\set[_echo_command=true]").await.unwrap();
    engine.execute("\\set[x=1]").await.unwrap();
    assert_eq!(var("x"), "1");
}

#[tokio::test]
async fn message_history_views_read_from_active_session() {
    let (_guard, engine) = setup();

    engine.execute("\\session-new[name=chat]").await.unwrap();
    engine
        .execute("\\session-add-usermsg first question")
        .await
        .unwrap();
    engine
        .execute("\\session-add-assistantmsg first answer")
        .await
        .unwrap();

    // ${1} is the newest message, ${.1} the oldest.
    engine.execute("\\echo ${1}").await.unwrap();
    assert_eq!(var("_output"), "first answer");
    engine.execute("\\echo ${.1}").await.unwrap();
    assert_eq!(var("_output"), "first question");
    // Out-of-range history indices read as empty.
    engine.execute("\\echo [${7}]").await.unwrap();
    assert_eq!(var("_output"), "[]");

    assert_eq!(var("#message_count"), "2");
}

#[tokio::test]
async fn session_and_model_lifecycle() {
    let (_guard, engine) = setup();

    engine
        .execute("\\model-new[name=fast, provider=mock, temperature=0.2]")
        .await
        .unwrap();
    engine.execute("\\session-new[name=a]").await.unwrap();
    engine.execute("\\session-new[name=b]").await.unwrap();
    engine.execute("\\session-activate a").await.unwrap();

    assert_eq!(var("#session_name"), "a");
    assert_eq!(var("#model_name"), "fast");

    engine.execute("\\session-delete b").await.unwrap();
    engine.execute("\\session-list").await.unwrap();
    let listing = engine.output_history().last().cloned().unwrap_or_default();
    assert!(listing.contains("a (0 messages)"));
    assert!(!listing.contains("b ("));
}

#[tokio::test]
async fn llm_client_get_caches_by_fingerprint() {
    let (_guard, engine) = setup();

    engine
        .execute("\\llm-client-get[provider=openai, key=sk-test-key-123]")
        .await
        .unwrap();
    let first_id = var("_client_id");
    assert_eq!(var("#client_created"), "true");
    assert_eq!(var("#client_count"), "1");

    engine
        .execute("\\llm-client-get[provider=openai, key=sk-test-key-123]")
        .await
        .unwrap();
    assert_eq!(var("_client_id"), first_id);
    assert_eq!(var("#client_created"), "false");
    assert_eq!(var("#client_count"), "1");
}

#[tokio::test]
async fn llm_call_dry_run_makes_no_api_call() {
    let (_guard, engine) = setup();
    let mock = install_mock_client();

    engine
        .execute("\\model-new[name=m, provider=mock, temperature=0.7]")
        .await
        .unwrap();
    engine
        .execute("\\session-new[name=s, system=be brief]")
        .await
        .unwrap();
    engine
        .execute("\\session-add-usermsg question one")
        .await
        .unwrap();
    engine
        .execute("\\session-add-usermsg question two")
        .await
        .unwrap();

    engine.execute("\\llm-call[dry_run=true]").await.unwrap();

    assert_eq!(mock.call_count(), 0, "dry run must not touch the client");
    assert_eq!(var("_output"), "DRY RUN - No API call made");
    assert_eq!(var("#dry_run_mode"), "true");
    assert_eq!(var("#dry_run_client_id"), "mock:test****");
    assert_eq!(var("#dry_run_model"), "m");
    assert_eq!(var("#dry_run_message_count"), "2");

    let printed = engine.output_history().last().cloned().unwrap_or_default();
    assert!(printed.contains("Client: mock:test**** (mock)"));
    assert!(printed.contains("Model: m (mock-model)"));
    assert!(printed.contains("temperature: 0.7"));
    assert!(printed.contains("System: be brief"));
    assert!(printed.contains("[1] user: question one"));
    assert!(printed.contains("Total Messages: 2"));
}

#[tokio::test]
async fn llm_call_sync_prints_and_records_response() {
    let (_guard, engine) = setup();
    let mock = install_mock_client();

    engine
        .execute("\\model-new[name=m, provider=mock]")
        .await
        .unwrap();
    engine.execute("\\session-new[name=s]").await.unwrap();
    engine.execute("\\session-add-usermsg ping").await.unwrap();

    engine.execute("\\llm-call").await.unwrap();

    assert_eq!(mock.call_count(), 1);
    assert_eq!(var("#llm_response"), "pong");
    assert_eq!(var("_output"), "pong");
    assert_eq!(var("#llm_call_success"), "true");
    assert_eq!(var("#llm_call_mode"), "sync");
}

#[tokio::test]
async fn llm_call_streaming_reassembles_chunks() {
    let (_guard, engine) = setup();
    install_mock_client();

    engine
        .execute("\\model-new[name=m, provider=mock]")
        .await
        .unwrap();
    engine.execute("\\session-new[name=s]").await.unwrap();
    engine.execute("\\session-add-usermsg hello").await.unwrap();

    engine.execute("\\llm-call[stream=true]").await.unwrap();

    assert_eq!(var("#llm_call_mode"), "streaming");
    assert_eq!(var("#llm_response"), "Hello! How can I help you today?");
}

#[tokio::test]
async fn llm_call_without_client_fails_usably() {
    let (_guard, engine) = setup();

    engine
        .execute("\\model-new[name=m, provider=mock]")
        .await
        .unwrap();
    engine.execute("\\session-new[name=s]").await.unwrap();

    let err = engine.execute("\\llm-call").await.unwrap_err();
    assert!(err.to_string().contains("llm-client-get"));
}

#[tokio::test]
async fn send_delegates_through_the_stack() {
    let (_guard, engine) = setup();
    let mock = install_mock_client();

    engine
        .execute("\\model-new[name=m, provider=mock]")
        .await
        .unwrap();
    engine.execute("\\session-new[name=s]").await.unwrap();

    engine.execute("\\send ping").await.unwrap();

    assert_eq!(mock.call_count(), 1);
    assert_eq!(var("#llm_response"), "pong");

    // The round trip recorded both sides of the exchange.
    let session = services::chat_service().unwrap().active_session().unwrap();
    assert_eq!(session.messages.len(), 2);
    assert_eq!(session.messages[0].content, "ping");
    assert_eq!(session.messages[1].content, "pong");
    assert_eq!(var("#message_count"), "2");
}

#[tokio::test]
async fn free_text_is_an_implicit_send() {
    let (_guard, engine) = setup();
    let mock = install_mock_client();

    engine
        .execute("\\model-new[name=m, provider=mock]")
        .await
        .unwrap();
    engine.execute("\\session-new[name=s]").await.unwrap();

    engine.execute("ping").await.unwrap();

    assert_eq!(mock.call_count(), 1);
    assert_eq!(var("#llm_response"), "pong");
}

#[tokio::test]
async fn reply_way_stream_switches_send_to_streaming() {
    let (_guard, engine) = setup();
    install_mock_client();

    engine
        .execute("\\model-new[name=m, provider=mock]")
        .await
        .unwrap();
    engine.execute("\\session-new[name=s]").await.unwrap();
    engine.execute("\\set[_reply_way=stream]").await.unwrap();

    engine.execute("\\send ping").await.unwrap();

    assert_eq!(var("#llm_call_mode"), "streaming");
    assert_eq!(var("#llm_response"), "pong");
}

#[tokio::test]
async fn get_env_mirrors_into_os_namespace() {
    let (_guard, engine) = setup();

    services::variable_service()
        .unwrap()
        .set_env_override("NEURO_SCENARIO_VAR", "from-env");

    engine.execute("\\get-env NEURO_SCENARIO_VAR").await.unwrap();
    assert_eq!(var("#os.NEURO_SCENARIO_VAR"), "from-env");
}

#[tokio::test]
async fn script_lines_execute_in_order_with_comments_ignored() {
    let (_guard, engine) = setup();

    let script = "\
%% setup
\\set[a=1]

%%> \\set[echoed=never]
\\set[b=${a}2]
";
    neuroshell::script::run_lines(&engine, script.lines())
        .await
        .unwrap();

    assert_eq!(var("a"), "1");
    assert_eq!(var("b"), "12");
    assert!(services::variable_service().unwrap().get("echoed").is_err());
}

#[tokio::test]
async fn script_stops_cleanly_at_quit() {
    let (_guard, engine) = setup();

    let script = "\\set[first=1]\n\\quit\n\\set[second=2]\n";
    neuroshell::script::run_lines(&engine, script.lines())
        .await
        .unwrap();

    assert_eq!(var("first"), "1");
    assert!(services::variable_service().unwrap().get("second").is_err());
}
