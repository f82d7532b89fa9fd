use super::kernels::{disturb_kernel, update_kernel};
use crate::constants::layout::{BINDING_CURRENT_POSITION, BINDING_CURRENT_VELOCITY, BINDING_PREVIOUS};
use crate::error::{FabricError, FabricResult};
use crate::fabric::{
    AccessState, ArrayDescriptor, ComputeBackend, DescriptorTable, DispatchSize, GridCell, KernelBindings, KernelKind,
    SimulationConstants, Transition, ViewAccess,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug)]
struct ArrayStorage {
    cells: Vec<GridCell>,
    state: AccessState,
}

/// Host-memory array with its device-side access state
#[derive(Clone, Debug)]
pub struct CpuArray {
    id: u64,
    label: Arc<str>,
    storage: Arc<Mutex<ArrayStorage>>,
}

impl CpuArray {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Copy of the contents as of the last submit
    pub fn snapshot(&self) -> Vec<GridCell> {
        self.storage.lock().cells.clone()
    }

    /// Access state as of the last submit
    pub fn state(&self) -> AccessState {
        self.storage.lock().state
    }

    fn require_state(&self, required: AccessState) -> FabricResult<()> {
        let actual = self.state();
        if actual != required {
            return Err(FabricError::AccessStateMismatch {
                array: self.label.to_string(),
                required,
                actual,
            });
        }
        Ok(())
    }
}

/// Upload source for a seeding copy
#[derive(Debug)]
pub struct CpuStaging {
    label: String,
    cells: Arc<Vec<GridCell>>,
}

impl CpuStaging {
    pub fn label(&self) -> &str {
        &self.label
    }
}

/// One recorded command
#[derive(Debug)]
pub enum CpuCommand {
    Copy {
        source: Arc<Vec<GridCell>>,
        destination: CpuArray,
    },
    Transition {
        array: CpuArray,
        transition: Transition,
    },
    Dispatch {
        kernel: KernelKind,
        constants: SimulationConstants,
        /// (binding, array) resolved from the descriptor table at record time
        arrays: Vec<(u32, CpuArray)>,
        groups: DispatchSize,
    },
}

/// Ordered command stream executed by [`CpuBackend::submit`]
#[derive(Debug, Default)]
pub struct CpuCommandList {
    label: String,
    commands: Vec<CpuCommand>,
}

impl CpuCommandList {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn commands(&self) -> &[CpuCommand] {
        &self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn dispatch_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, CpuCommand::Dispatch { .. }))
            .count()
    }

    pub fn transition_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, CpuCommand::Transition { .. }))
            .count()
    }

    /// Push a command directly, bypassing the simulation's state tracking
    pub fn push(&mut self, command: CpuCommand) {
        self.commands.push(command);
    }
}

/// Reference backend running the kernels on the host.
///
/// Every transition is checked against the array's device-side state and every
/// dispatch requires its bound arrays to be writable, so recording mistakes show
/// up as errors on submit instead of as undefined GPU behaviour.
#[derive(Debug, Default)]
pub struct CpuBackend {
    next_array_id: AtomicU64,
}

impl CpuBackend {
    pub fn new() -> Self {
        log::info!("[CpuBackend::new] Using CPU reference backend");
        Self::default()
    }

    fn execute(&self, command: CpuCommand) -> FabricResult<()> {
        match command {
            CpuCommand::Transition { array, transition } => {
                array.require_state(transition.from)?;
                array.storage.lock().state = transition.to;
            }
            CpuCommand::Copy { source, destination } => {
                destination.require_state(AccessState::CopyDestination)?;
                let mut storage = destination.storage.lock();
                if storage.cells.len() != source.len() {
                    return Err(copy_mismatch("staging", source.len(), &destination.label, storage.cells.len()));
                }
                storage.cells.copy_from_slice(&source);
            }
            CpuCommand::Dispatch {
                kernel,
                constants,
                arrays,
                groups,
            } => {
                for (i, (_, array)) in arrays.iter().enumerate() {
                    if arrays[..i].iter().any(|(_, other)| other.id == array.id) {
                        return Err(FabricError::AliasedBinding {
                            array: array.label.to_string(),
                        });
                    }
                    array.require_state(AccessState::WritableByCompute)?;
                }
                let bound = |binding: u32| {
                    arrays
                        .iter()
                        .find(|(b, _)| *b == binding)
                        .map(|(_, array)| array)
                        .ok_or(FabricError::DescriptorsUnbound)
                };
                match kernel {
                    KernelKind::Update => {
                        let previous = bound(BINDING_PREVIOUS)?;
                        let current = bound(BINDING_CURRENT_POSITION)?;
                        let velocity = bound(BINDING_CURRENT_VELOCITY)?;

                        let current_cells = current.snapshot();
                        let mut previous_cells = previous.storage.lock();
                        let mut velocity_cells = velocity.storage.lock();
                        update_kernel(
                            &constants,
                            groups,
                            &mut previous_cells.cells,
                            &current_cells,
                            &mut velocity_cells.cells,
                        );
                    }
                    KernelKind::Disturb => {
                        let position = bound(BINDING_CURRENT_POSITION)?;
                        let velocity = bound(BINDING_CURRENT_VELOCITY)?;
                        let mut position_cells = position.storage.lock();
                        let mut velocity_cells = velocity.storage.lock();
                        disturb_kernel(&constants, &mut position_cells.cells, &mut velocity_cells.cells);
                    }
                }
            }
        }
        Ok(())
    }
}

impl ComputeBackend for CpuBackend {
    type Array = CpuArray;
    type Staging = CpuStaging;
    type Recorder = CpuCommandList;
    type Kernel = KernelKind;

    fn begin_recording(&self, label: &str) -> CpuCommandList {
        CpuCommandList {
            label: label.to_string(),
            commands: Vec::new(),
        }
    }

    fn submit(&self, recorder: CpuCommandList) -> FabricResult<()> {
        log::debug!(
            "[CpuBackend::submit] Executing '{}' ({} commands)",
            recorder.label,
            recorder.commands.len()
        );
        for command in recorder.commands {
            self.execute(command)?;
        }
        Ok(())
    }

    fn create_kernel(&self, kind: KernelKind) -> FabricResult<KernelKind> {
        Ok(kind)
    }

    fn create_array(&self, desc: &ArrayDescriptor) -> FabricResult<CpuArray> {
        let count = usize::try_from(desc.cell_count())
            .map_err(|_| FabricError::allocation(desc.label.as_str(), "cell count exceeds host address space"))?;
        let mut cells = Vec::new();
        cells
            .try_reserve_exact(count)
            .map_err(|e| FabricError::allocation(desc.label.as_str(), e))?;
        cells.resize(count, GridCell::ZERO);

        let id = self.next_array_id.fetch_add(1, Ordering::Relaxed);
        Ok(CpuArray {
            id,
            label: Arc::from(desc.label.as_str()),
            storage: Arc::new(Mutex::new(ArrayStorage {
                cells,
                state: AccessState::Undefined,
            })),
        })
    }

    fn create_staging(&self, label: &str, cells: &[GridCell]) -> FabricResult<CpuStaging> {
        Ok(CpuStaging {
            label: label.to_string(),
            cells: Arc::new(cells.to_vec()),
        })
    }

    fn record_copy(&self, recorder: &mut CpuCommandList, staging: &CpuStaging, array: &CpuArray) -> FabricResult<()> {
        let cells = array.storage.lock().cells.len();
        if staging.cells.len() != cells {
            return Err(copy_mismatch(&staging.label, staging.cells.len(), &array.label, cells));
        }
        recorder.push(CpuCommand::Copy {
            source: Arc::clone(&staging.cells),
            destination: array.clone(),
        });
        Ok(())
    }

    fn record_transition(&self, recorder: &mut CpuCommandList, array: &CpuArray, transition: Transition) {
        recorder.push(CpuCommand::Transition {
            array: array.clone(),
            transition,
        });
    }

    fn validate_bindings(
        &self,
        kernel: &KernelKind,
        bindings: &KernelBindings,
        table: &DescriptorTable<CpuArray>,
    ) -> FabricResult<()> {
        resolve_bindings(*kernel, bindings, table).map(|_| ())
    }

    fn record_dispatch(
        &self,
        recorder: &mut CpuCommandList,
        kernel: &KernelKind,
        constants: &SimulationConstants,
        bindings: &KernelBindings,
        table: &DescriptorTable<CpuArray>,
        groups: DispatchSize,
    ) -> FabricResult<()> {
        let arrays = resolve_bindings(*kernel, bindings, table)?
            .into_iter()
            .map(|(binding, array)| (binding, array.clone()))
            .collect();

        recorder.push(CpuCommand::Dispatch {
            kernel: *kernel,
            constants: *constants,
            arrays,
            groups,
        });
        Ok(())
    }
}

/// Read/write arrays a kernel binds, in binding order, with aliasing rejected
fn resolve_bindings<'a>(
    kernel: KernelKind,
    bindings: &KernelBindings,
    table: &'a DescriptorTable<CpuArray>,
) -> FabricResult<Vec<(u32, &'a CpuArray)>> {
    let mut arrays: Vec<(u32, &CpuArray)> = Vec::with_capacity(kernel.bindings().len());
    for &binding in kernel.bindings() {
        let slot = bindings.get(binding).ok_or(FabricError::DescriptorsUnbound)?;
        let array = table.resolve(slot, ViewAccess::ReadWrite)?;
        if arrays.iter().any(|(_, bound)| bound.id == array.id) {
            return Err(FabricError::AliasedBinding {
                array: array.label.to_string(),
            });
        }
        arrays.push((binding, array));
    }
    Ok(arrays)
}

fn copy_mismatch(source: &str, source_cells: usize, destination: &str, destination_cells: usize) -> FabricError {
    FabricError::Gpu {
        message: format!(
            "copy of {} cells from {} into {} ({} cells)",
            source_cells, source, destination, destination_cells
        ),
    }
}
