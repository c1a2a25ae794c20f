//! End-to-end runs of the answer, generate and refine flows over in-memory
//! collaborators.

use std::sync::Arc;

use docagent::agents::{
    AnswerRequest, GenerateRequest, RefineRequest, RunHooks, answer_question, generate_proposal,
    refine_proposal,
};
use docagent::core::types::{
    Comment, Proposal, ProposalContent, ProposalHandle, RepoFile, SearchHit,
};
use docagent::io::config::AgentConfig;
use docagent::task_loop::{LoopStop, StepRecord};
use docagent::test_support::{
    MemoryFileStore, MemoryProposalStore, MemoryRetrievalIndex, RecordingChannel, ScriptedModel,
    ScriptedReply, memory_deps,
};
use docagent::tools::proposal::NO_CHANGES;

const KEYS: &str = "# Keys\n\nKeys rotate yearly.\n";

fn keys_repo() -> Arc<MemoryFileStore> {
    Arc::new(MemoryFileStore::with_files([RepoFile::new(
        "ops/keys.md",
        KEYS,
    )]))
}

const MODIFY: &str = "<modify_file>
<path>ops/keys.md</path>
<hunk>
<search>Keys rotate yearly.</search>
<replace>Keys rotate monthly.</replace>
</hunk>
</modify_file>";

#[tokio::test]
async fn answer_renders_footnotes_for_cited_sources() {
    let model = ScriptedModel::new([
        "<query_rag><query>key rotation</query></query_rag>",
        "<attempt_complete>
<message source=\"1,2\">Rotate keys monthly.</message>
<message source=\"2\">Use the admin console.</message>
<source id=\"1\" uri=\"uri1\">Runbook</source>
<source id=\"2\" uri=\"uri2\">Thread</source>
</attempt_complete>",
    ]);
    let files = keys_repo();
    let mut deps = memory_deps(&model, &files, &Arc::new(MemoryProposalStore::default()));
    let index = Arc::new(MemoryRetrievalIndex::with_hits(vec![SearchHit {
        source: "uri1".to_string(),
        score: 0.12,
        text: "Rotate monthly.".to_string(),
    }]));
    deps.retrieval = Some(index.clone());
    let channel = Arc::new(RecordingChannel::default());

    let outcome = answer_question(
        &deps,
        AnswerRequest {
            question: "How often do keys rotate?".to_string(),
            channel: channel.clone(),
        },
        &mut RunHooks::default(),
    )
    .await
    .expect("answer");

    assert_eq!(outcome.stop, LoopStop::Completed);
    assert_eq!(
        channel.replies(),
        vec![
            "Rotate keys monthly.[^1][^2]\n\nUse the admin console.[^2]\n\n[^1]: uri1\n[^2]: uri2"
                .to_string()
        ]
    );
    assert_eq!(index.queries().len(), 1);
    assert!(model.system_prompts()[0].contains("## query_rag"));
}

#[tokio::test]
async fn answer_without_index_hides_retrieval_usage() {
    let model = ScriptedModel::new(["<attempt_complete><message>No idea.</message></attempt_complete>"]);
    let deps = memory_deps(&model, &keys_repo(), &Arc::new(MemoryProposalStore::default()));
    answer_question(
        &deps,
        AnswerRequest {
            question: "?".to_string(),
            channel: Arc::new(RecordingChannel::default()),
        },
        &mut RunHooks::default(),
    )
    .await
    .expect("answer");
    let prompt = &model.system_prompts()[0];
    assert!(prompt.contains("## find_file"));
    assert!(!prompt.contains("## query_rag"));
    assert!(!prompt.contains("## modify_file"));
}

/// Let detached tasks spawned during a run get polled.
async fn settle(channel: &RecordingChannel) {
    for _ in 0..16 {
        if channel.presence_signals() > 0 {
            return;
        }
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn answer_signals_presence() {
    let model = ScriptedModel::new(["<attempt_complete><message>Yes.</message></attempt_complete>"]);
    let deps = memory_deps(&model, &keys_repo(), &Arc::new(MemoryProposalStore::default()));
    let channel = Arc::new(RecordingChannel::default());

    let outcome = answer_question(
        &deps,
        AnswerRequest {
            question: "Do keys rotate?".to_string(),
            channel: channel.clone(),
        },
        &mut RunHooks::default(),
    )
    .await
    .expect("answer");
    settle(&channel).await;

    assert_eq!(outcome.stop, LoopStop::Completed);
    assert!(channel.presence_signals() >= 1);
}

#[tokio::test]
async fn failed_presence_signal_does_not_affect_the_run() {
    let model = ScriptedModel::new([
        "<find_file><path>ops/keys.md</path></find_file>",
        "<attempt_complete><message>Keys rotate yearly.</message></attempt_complete>",
    ]);
    let deps = memory_deps(&model, &keys_repo(), &Arc::new(MemoryProposalStore::default()));
    let channel = Arc::new(RecordingChannel::failing_presence());

    let outcome = answer_question(
        &deps,
        AnswerRequest {
            question: "How often do keys rotate?".to_string(),
            channel: channel.clone(),
        },
        &mut RunHooks::default(),
    )
    .await
    .expect("answer");
    settle(&channel).await;

    assert_eq!(outcome.stop, LoopStop::Completed);
    assert_eq!(outcome.steps, 2);
    assert!(channel.presence_signals() >= 1);
    assert_eq!(channel.replies(), vec!["Keys rotate yearly.".to_string()]);
}

#[tokio::test]
async fn generate_guards_edits_links_and_opens_a_proposal() {
    let model = ScriptedModel::new([
        "<create_proposal><title>Keys</title><description>Monthly rotation.</description></create_proposal>",
        MODIFY,
        "<link_sources><path>ops/keys.md</path><uri>https://chat.example.com/p1</uri></link_sources>",
        "<create_proposal><title>Keys</title><description>Monthly rotation.</description></create_proposal>",
        "<attempt_complete><message source=\"1\">Opened a proposal.</message><source id=\"1\" uri=\"https://chat.example.com/p1\">thread</source></attempt_complete>",
    ]);
    let files = keys_repo();
    let proposals = Arc::new(MemoryProposalStore::default());
    let deps = memory_deps(&model, &files, &proposals);
    let channel = Arc::new(RecordingChannel::default());
    let mut records: Vec<StepRecord> = Vec::new();
    let mut hooks = RunHooks {
        on_step: Box::new(|record: &StepRecord| records.push(record.clone())),
        ..RunHooks::default()
    };

    let outcome = generate_proposal(
        &deps,
        GenerateRequest {
            instruction: "Document that keys now rotate monthly.".to_string(),
            channel: channel.clone(),
        },
        &mut hooks,
    )
    .await
    .expect("generate");
    drop(hooks);

    assert_eq!(outcome.run.steps, 5);
    assert_eq!(outcome.run.stop, LoopStop::Completed);
    let handle = outcome.proposal.expect("proposal handle");
    assert_eq!(handle.id, 1);

    assert_eq!(
        records[0].observation.as_deref(),
        Some(format!("<error>{NO_CHANGES}</error>").as_str())
    );
    assert_eq!(
        files.content("ops/keys.md").as_deref(),
        Some("# Keys\n\nKeys rotate monthly.\n")
    );
    assert_eq!(proposals.proposals().len(), 1);
    assert_eq!(proposals.proposals()[0].content.title, "Keys");
    assert_eq!(
        channel.replies(),
        vec!["Opened a proposal.[^1]\n\n[^1]: https://chat.example.com/p1".to_string()]
    );
    assert!(model.system_prompts()[0].contains("ops/keys.md"));
}

#[tokio::test]
async fn refine_edits_updates_and_comments_on_the_proposal() {
    let handle = ProposalHandle {
        id: 7,
        url: "https://docs.example.com/pull/7".to_string(),
    };
    let proposals = Arc::new(MemoryProposalStore::with_proposals(vec![Proposal {
        handle: handle.clone(),
        content: ProposalContent {
            title: "Keys".to_string(),
            description: "Rotation docs.".to_string(),
        },
        comments: vec![Comment {
            author: "rev".to_string(),
            body: "Please say monthly.".to_string(),
        }],
        diff: "diff --git a/ops/keys.md b/ops/keys.md\n@@ -1 +1 @@\n-# Key\n+# Keys\n".to_string(),
    }]));
    let model = ScriptedModel::new([
        "<update_proposal><title>Keys</title><description>Monthly.</description></update_proposal>",
        MODIFY,
        "<update_proposal><title>Keys (monthly)</title><description>Monthly.</description></update_proposal>",
        "<attempt_complete><message>Switched to monthly.</message></attempt_complete>",
    ]);
    let files = keys_repo();
    let deps = memory_deps(&model, &files, &proposals);

    let outcome = refine_proposal(
        &deps,
        RefineRequest {
            proposal: handle,
            feedback: "Please say monthly.".to_string(),
        },
        &mut RunHooks::default(),
    )
    .await
    .expect("refine");

    assert_eq!(outcome.stop, LoopStop::Completed);
    let sent = model.sent();
    assert!(sent[1].starts_with(&format!("<error>{NO_CHANGES}</error>")));

    let stored = &proposals.proposals()[0];
    assert_eq!(stored.content.title, "Keys (monthly)");
    let last = stored.comments.last().expect("reply comment");
    assert_eq!(last.author, "docagent");
    assert_eq!(last.body, "Switched to monthly.");

    let prompt = &model.system_prompts()[0];
    assert!(prompt.contains("modified ops/keys.md"));
    assert!(prompt.contains("rev: Please say monthly."));
    assert!(!prompt.contains("## create_proposal"));
}

#[tokio::test]
async fn model_failure_sends_the_notice_and_labels_the_error() {
    let model = ScriptedModel::new([ScriptedReply::Fail("upstream timeout".to_string())]);
    let deps = memory_deps(&model, &keys_repo(), &Arc::new(MemoryProposalStore::default()));
    let channel = Arc::new(RecordingChannel::default());

    let err = answer_question(
        &deps,
        AnswerRequest {
            question: "?".to_string(),
            channel: channel.clone(),
        },
        &mut RunHooks::default(),
    )
    .await
    .unwrap_err();

    assert_eq!(
        format!("{err:#}"),
        "failed to initiate task loop: failed to generate response: upstream timeout"
    );
    assert_eq!(channel.replies(), vec![AgentConfig::default().failure_notice]);
}

#[tokio::test]
async fn unparseable_reply_is_a_hard_failure() {
    let model = ScriptedModel::new(["Sure, I'll look into it."]);
    let files = keys_repo();
    let proposals = Arc::new(MemoryProposalStore::default());
    let deps = memory_deps(&model, &files, &proposals);
    let channel = Arc::new(RecordingChannel::default());

    let err = generate_proposal(
        &deps,
        GenerateRequest {
            instruction: "Update the docs.".to_string(),
            channel: channel.clone(),
        },
        &mut RunHooks::default(),
    )
    .await
    .unwrap_err();

    assert!(format!("{err:#}").starts_with("failed to initiate task loop: failed to parse response"));
    assert_eq!(channel.replies().len(), 1);
    assert_eq!(proposals.calls(), 0);
    assert_eq!(files.content("ops/keys.md").as_deref(), Some(KEYS));
}
