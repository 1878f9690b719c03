// Resource slot - the handler's system of record for the current resource

/// Generation of a committed resource; bumps on every commit
pub type Generation = u64;

/// Holds at most one resource
///
/// Every commit gets a new generation, so a job that read a resource can later
/// remove exactly that resource and never one committed after it.
#[derive(Debug)]
pub struct ResourceSlot<R> {
    resource: Option<R>,
    generation: Generation,
}

impl<R: Clone> ResourceSlot<R> {
    pub fn new() -> Self {
        Self {
            resource: None,
            generation: 0,
        }
    }

    /// Current resource and its generation
    pub fn held(&self) -> Option<(R, Generation)> {
        self.resource.clone().map(|r| (r, self.generation))
    }

    pub fn is_empty(&self) -> bool {
        self.resource.is_none()
    }

    /// Store `resource` under a new generation
    pub fn commit(&mut self, resource: R) -> Generation {
        self.generation += 1;
        self.resource = Some(resource);
        self.generation
    }

    /// Remove the resource only if it is still the one committed at `generation`
    pub fn take_if(&mut self, generation: Generation) -> Option<R> {
        if self.generation == generation {
            self.resource.take()
        } else {
            None
        }
    }

    pub fn take(&mut self) -> Option<R> {
        self.resource.take()
    }
}

impl<R: Clone> Default for ResourceSlot<R> {
    fn default() -> Self {
        Self::new()
    }
}
