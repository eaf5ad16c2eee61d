use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize structured logging.
/// Emits JSON lines on stdout; `RUST_LOG` overrides `default_filter`.
/// Returns `false` when a global subscriber was already installed.
pub fn init_telemetry(default_filter: &str) -> bool {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let formatting_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .json();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(formatting_layer)
        .try_init()
        .is_ok()
}

/// Subscriber layer that records every event together with the
/// `request_id` of the nearest enclosing span that carries one.
#[cfg(test)]
pub(crate) mod capture {
    use std::sync::{Arc, Mutex};
    use tracing::field::{Field, Visit};
    use tracing::span::{Attributes, Id};
    use tracing::{Event, Subscriber};
    use tracing_subscriber::layer::{Context, Layer};
    use tracing_subscriber::registry::LookupSpan;

    #[derive(Debug, Clone)]
    pub struct CapturedEvent {
        pub message: String,
        pub request_id: Option<String>,
    }

    #[derive(Clone, Default)]
    pub struct CaptureLayer {
        events: Arc<Mutex<Vec<CapturedEvent>>>,
    }

    impl CaptureLayer {
        pub fn events(&self) -> Vec<CapturedEvent> {
            self.events.lock().unwrap().clone()
        }

        pub fn find(&self, message: &str) -> Option<CapturedEvent> {
            self.events().into_iter().find(|e| e.message == message)
        }
    }

    struct RequestId(String);

    #[derive(Default)]
    struct Fields {
        message: Option<String>,
        request_id: Option<String>,
    }

    impl Visit for Fields {
        fn record_str(&mut self, field: &Field, value: &str) {
            match field.name() {
                "message" => self.message = Some(value.to_string()),
                "request_id" => self.request_id = Some(value.to_string()),
                _ => {}
            }
        }

        fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
            match field.name() {
                "message" => self.message = Some(format!("{:?}", value)),
                "request_id" => self.request_id = Some(format!("{:?}", value)),
                _ => {}
            }
        }
    }

    impl<S> Layer<S> for CaptureLayer
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
            let mut fields = Fields::default();
            attrs.record(&mut fields);
            if let (Some(request_id), Some(span)) = (fields.request_id, ctx.span(id)) {
                span.extensions_mut().insert(RequestId(request_id));
            }
        }

        fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
            let mut fields = Fields::default();
            event.record(&mut fields);

            let mut request_id = None;
            if let Some(scope) = ctx.event_scope(event) {
                for span in scope {
                    let extensions = span.extensions();
                    if let Some(id) = extensions.get::<RequestId>() {
                        request_id = Some(id.0.clone());
                        break;
                    }
                }
            }

            self.events.lock().unwrap().push(CapturedEvent {
                message: fields.message.unwrap_or_default(),
                request_id,
            });
        }
    }
}
