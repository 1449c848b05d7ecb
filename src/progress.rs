/// Upper bound on callback invocations per pass, not counting the final one.
const STEPS: usize = 64;

/// Reports the processed fraction of a buffer to an optional observer.
///
/// Codecs call [`Progress::advance`] as often as they like; the callback only fires once the
/// input has moved forward by at least 1/64th since the last report, plus once on completion.
pub struct Progress<'a> {
    callback: Option<&'a mut dyn FnMut(f32)>,
    total: usize,
    next: usize,
}

impl<'a> Progress<'a> {
    pub fn new(callback: &'a mut dyn FnMut(f32)) -> Self {
        Self {
            callback: Some(callback),
            total: 0,
            next: 0,
        }
    }

    pub fn silent() -> Self {
        Self {
            callback: None,
            total: 0,
            next: 0,
        }
    }

    fn step(&self) -> usize {
        (self.total / STEPS).max(1)
    }

    pub(crate) fn start(&mut self, total: usize) {
        self.total = total;
        self.next = self.step();
    }

    #[inline]
    pub(crate) fn advance(&mut self, done: usize) {
        if done < self.next || done >= self.total {
            return;
        }
        self.next = done + self.step();
        if let Some(callback) = self.callback.as_deref_mut() {
            callback(done as f32 / self.total as f32);
        }
    }

    pub(crate) fn finish(&mut self) {
        self.next = usize::MAX;
        if let Some(callback) = self.callback.as_deref_mut() {
            callback(1.0);
        }
    }
}

impl Default for Progress<'_> {
    fn default() -> Self {
        Self::silent()
    }
}

#[cfg(test)]
mod tests {
    use crate::progress::Progress;

    #[test]
    fn reports_are_bounded_and_monotonic() {
        let mut seen = vec![];
        let mut record = |fraction: f32| seen.push(fraction);
        let mut progress = Progress::new(&mut record);
        progress.start(10_000);
        for done in 1..=10_000 {
            progress.advance(done);
        }
        progress.finish();
        drop(progress);

        assert!(seen.len() <= 65, "{} reports", seen.len());
        assert!(seen.windows(2).all(|pair| pair[0] <= pair[1]));
        assert_eq!(Some(&1.0), seen.last());
    }

    #[test]
    fn tiny_inputs_still_finish() {
        let mut seen = vec![];
        let mut record = |fraction: f32| seen.push(fraction);
        let mut progress = Progress::new(&mut record);
        progress.start(1);
        progress.advance(1);
        progress.finish();
        drop(progress);

        assert_eq!(vec![1.0], seen);
    }
}
