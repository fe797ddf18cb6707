use model::Envelope;

/// Receives loaded models, typically a renderer building its scene.
pub trait RenderableSink<P> {
    /// The region the sink currently considers valid, if any.
    fn valid_domain(&self) -> Option<&Envelope>;

    fn set_valid_domain(&mut self, domain: Envelope);

    fn add(&mut self, object: P);
}

/// Applies a freshly loaded dataset envelope to `sink`, unless the sink
/// already has a domain of its own (anything but the default sentinel).
pub(crate) fn apply_domain<P, R>(sink: &mut R, envelope: Option<Envelope>)
where
    R: RenderableSink<P> + ?Sized,
{
    let Some(envelope) = envelope else {
        return;
    };
    let unset = sink
        .valid_domain()
        .map_or(true, Envelope::is_default_domain);
    if unset {
        sink.set_valid_domain(envelope);
    }
}

/// A sink that keeps every model it receives.
#[derive(Debug, Clone)]
pub struct CollectingRenderer<P> {
    domain: Option<Envelope>,
    objects: Vec<P>,
}

impl<P> CollectingRenderer<P> {
    pub fn new() -> Self {
        Self {
            domain: None,
            objects: Vec::new(),
        }
    }

    pub fn with_domain(domain: Envelope) -> Self {
        Self {
            domain: Some(domain),
            objects: Vec::new(),
        }
    }

    pub fn objects(&self) -> &[P] {
        &self.objects
    }

    pub fn into_objects(self) -> Vec<P> {
        self.objects
    }
}

impl<P> Default for CollectingRenderer<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> RenderableSink<P> for CollectingRenderer<P> {
    fn valid_domain(&self) -> Option<&Envelope> {
        self.domain.as_ref()
    }

    fn set_valid_domain(&mut self, domain: Envelope) {
        self.domain = Some(domain);
    }

    fn add(&mut self, object: P) {
        self.objects.push(object);
    }
}
