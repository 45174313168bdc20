//! Log output of run lifecycle events.

use std::io;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dash_workflow::{NoResume, RunScope, RunStatus, Step, StepContext, StepError, StepOutcome, WorkflowBuilder};
use tracing::Level;
use tracing_subscriber::fmt::MakeWriter;

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

struct BufferWriter(Arc<Mutex<Vec<u8>>>);

impl<'a> MakeWriter<'a> for SharedBuffer {
    type Writer = BufferWriter;

    fn make_writer(&'a self) -> Self::Writer {
        BufferWriter(Arc::clone(&self.0))
    }
}

impl io::Write for BufferWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self
            .0
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "lock poisoned"))?;
        guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct AlwaysFails;

#[async_trait]
impl Step for AlwaysFails {
    type Input = u32;
    type Output = u32;
    type Resume = NoResume;

    fn id(&self) -> &'static str {
        "always-fails"
    }

    async fn execute(&self, _input: u32, _ctx: &StepContext<'_, NoResume>) -> Result<StepOutcome<u32>, StepError> {
        Err(StepError::internal("boom"))
    }
}

#[tokio::test]
async fn run_failure_logs_at_error_level() {
    let sink = SharedBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(sink.clone())
        .json()
        .with_max_level(Level::DEBUG)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let workflow = WorkflowBuilder::new("failing").then(AlwaysFails).build();
    let outcome = workflow.execute(RunScope::new("t", "th"), 1).await.unwrap();
    assert_eq!(outcome.status(), RunStatus::Failed);

    let bytes = sink.0.lock().expect("lock output").clone();
    let text = String::from_utf8(bytes).expect("utf8 log output");
    let failure: serde_json::Value = text
        .lines()
        .filter_map(|l| serde_json::from_str::<serde_json::Value>(l).ok())
        .find(|v| v["fields"]["message"] == "run failed")
        .expect("run failure logged");

    assert_eq!(failure["level"], "ERROR");
    assert_eq!(failure["fields"]["code"], "INTERNAL");
    assert_eq!(failure["fields"]["step"], "always-fails");
}
