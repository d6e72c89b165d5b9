use crate::Packet;

/// Identifier of a traffic class inside a classful queueing discipline.
pub type ClassId = u32;

/// Maps packets to traffic classes.
///
/// Returning `None` means the packet could not be classified; the discipline will drop it.
pub trait Classifier: Send + Sync + 'static {
    fn classify(&self, packet: &Packet) -> Option<ClassId>;
}

impl<F> Classifier for F
where
    F: Fn(&Packet) -> Option<ClassId> + Send + Sync + 'static,
{
    #[inline]
    fn classify(&self, packet: &Packet) -> Option<ClassId> {
        self(packet)
    }
}

/// Classifies IPv4 packets by the class selector bits of their DSCP (`dscp >> 3`).
///
/// Class selectors range from 0 to 7. Packets whose selector is not below `classes` are
/// folded into the highest class; packets without an IPv4 header are not classified.
#[derive(Debug, Clone, Copy)]
pub struct DscpClassifier {
    classes: u32,
}

impl DscpClassifier {
    /// Creates a classifier for `classes` traffic classes (at least one).
    pub fn new(classes: u32) -> Self {
        Self { classes: classes.max(1) }
    }
}

impl Default for DscpClassifier {
    fn default() -> Self {
        Self::new(8)
    }
}

impl Classifier for DscpClassifier {
    fn classify(&self, packet: &Packet) -> Option<ClassId> {
        let selector = u32::from(packet.ipv4()?.dscp >> 3);
        Some(selector.min(self.classes - 1))
    }
}
